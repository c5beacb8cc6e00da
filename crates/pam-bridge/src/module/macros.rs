//! Entry point generation for service modules

/// Export the six `pam_sm_*` entry points for a [`crate::ModuleHandler`]
///
/// The expression is evaluated once, on the first call into the module.
///
/// ```ignore
/// use pam_bridge::{pam_module, ModuleHandler};
///
/// struct Deny;
/// impl ModuleHandler for Deny {}
///
/// pam_module!(Deny);
/// ```
#[macro_export]
macro_rules! pam_module {
    (@entry $symbol:ident, $event:ident) => {
        /// # Safety
        ///
        /// Called by libpam with the arguments of the current invocation.
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(
            pamh: *mut $crate::ffi::sys::pam_handle_t,
            flags: ::std::os::raw::c_int,
            argc: ::std::os::raw::c_int,
            argv: *const *const ::std::os::raw::c_char,
        ) -> ::std::os::raw::c_int {
            $crate::module::dispatch(
                __pam_bridge_handler(),
                $crate::module::ModuleEvent::$event,
                pamh,
                flags,
                argc,
                argv,
            )
        }
    };

    ($init:expr) => {
        fn __pam_bridge_handler() -> &'static dyn $crate::ModuleHandler {
            static HANDLER: $crate::__private::OnceCell<
                ::std::boxed::Box<dyn $crate::ModuleHandler>,
            > = $crate::__private::OnceCell::new();
            HANDLER
                .get_or_init(|| -> ::std::boxed::Box<dyn $crate::ModuleHandler> {
                    ::std::boxed::Box::new($init)
                })
                .as_ref()
        }

        $crate::pam_module!(@entry pam_sm_authenticate, Authenticate);
        $crate::pam_module!(@entry pam_sm_setcred, SetCred);
        $crate::pam_module!(@entry pam_sm_acct_mgmt, AcctMgmt);
        $crate::pam_module!(@entry pam_sm_open_session, OpenSession);
        $crate::pam_module!(@entry pam_sm_close_session, CloseSession);
        $crate::pam_module!(@entry pam_sm_chauthtok, ChangeAuthTok);
    };
}
