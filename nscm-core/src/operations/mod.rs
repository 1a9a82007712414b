pub mod auth;
pub mod report;
pub mod verify;
pub mod whitelist;

pub use auth::{
    AuthSettings, Grant, OpenerFn, Pkce, SsoConnection, Team, apply_signin, email_signin,
    exchange_code, signout, sso_signin, team_registry,
};
pub use report::Report;
pub use verify::{Verification, verify};
pub use whitelist::{Classification, Confirm, Reconciler, Reconciliation, Stage, classify};
