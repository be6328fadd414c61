pub mod chrome;
pub mod login;
pub mod session;
pub mod stability;

pub use chrome::ChromeBrowser;
pub use login::{LoginOutcome, LoginSequencer, LoginState};
pub use session::ScribeSession;
pub use stability::{StabilityPhase, StabilityWaiter};
