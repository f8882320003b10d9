use std::fmt;

use parking_lot::Mutex;

/// Portal surfaces the client can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Home,
    Login,
    Dashboard,
    Admin,
}

impl Route {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Admin => "/admin",
        }
    }

    /// Landing page after a successful login, chosen from server-confirmed
    /// role flags.
    #[must_use]
    pub const fn landing(is_admin: bool) -> Self {
        if is_admin { Route::Admin } else { Route::Dashboard }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Navigation collaborator.
///
/// Navigation is in-app: implementations move between surfaces without
/// reloading anything, so session state in memory survives the move.
pub trait Navigator: Send + Sync {
    fn current(&self) -> Route;

    fn navigate(&self, route: Route);
}

/// Send the user to the login surface unless they are already there.
pub fn redirect_to_login(navigator: &dyn Navigator) {
    if navigator.current() != Route::Login {
        navigator.navigate(Route::Login);
    }
}

/// Navigator that tracks the current route in memory.
#[derive(Debug, Default)]
pub struct InAppNavigator {
    current: Mutex<Route>,
}

impl InAppNavigator {
    #[must_use]
    pub fn new(start: Route) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }
}

impl Navigator for InAppNavigator {
    fn current(&self) -> Route {
        *self.current.lock()
    }

    fn navigate(&self, route: Route) {
        let mut current = self.current.lock();
        let from = *current;
        tracing::info!(%from, to = %route, "navigating");
        *current = route;
    }
}
