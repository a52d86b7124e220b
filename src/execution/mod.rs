pub mod executor;

pub use executor::{ActionOutput, DeployAction, ScriptDeployAction};
