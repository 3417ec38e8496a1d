pub mod config;
pub mod error;
pub mod events;
pub mod loader;
pub mod pointer;
pub mod state;

pub mod tasks {
    pub mod refresh;
    pub mod viewer;
}
