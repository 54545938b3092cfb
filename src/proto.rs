//! Generated greeter types. The health protocol comes from `tonic_health::pb`.

pub mod helloworld {
    tonic::include_proto!("helloworld");
}

pub use helloworld::greeter_client::GreeterClient;
pub use helloworld::greeter_server::{Greeter, GreeterServer};
pub use helloworld::{HelloReply, HelloRequest};
