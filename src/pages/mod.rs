mod bookmarks;
mod callback;
mod guard;
mod home;
mod login;

pub use callback::AuthCallbackPage;
pub use guard::{GuestOnly, RequireSession};
pub(crate) use guard::use_sign_out;
pub use home::HomePage;
pub use login::LoginPage;
