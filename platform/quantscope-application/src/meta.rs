pub const ENGINE_NAME: &str = "quantscope";

pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
