// External player handling - command templates and process supervision

pub mod command;
pub mod supervisor;

pub use command::{find_binary, known_players, resolve, PATH_PLACEHOLDER};
pub use supervisor::{ExitReport, LaunchError, PlayerSupervisor};
