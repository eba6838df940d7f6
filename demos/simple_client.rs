//! Calls `echo` on a zerorpc server.
//!
//! Usage: `cargo run --example simple_client -- tcp://127.0.0.1:4242`
use std::error::Error;

use tracing_subscriber::EnvFilter;
use zerorpc::{Client, Value};

fn main() -> std::result::Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("zerorpc=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp://127.0.0.1:4242".to_string());

    let mut client = Client::builder().verbose(true).connect(&endpoint)?;
    let result = client.invoke("echo", &[Value::String("Hello, RPC Server!".into())])?;
    println!("Received response: {:?}", result);
    client.close()?;
    Ok(())
}
