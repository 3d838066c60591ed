pub mod poller;
pub mod runtime;

pub use runtime::{ContainerRuntime, DockerRuntime};
