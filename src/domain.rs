use prometheus::Registry;

/// Registers a group of meters. Binding the same group twice into one registry
/// is an error.
pub trait MeterBinder {
    fn bind_to(&self, registry: &Registry) -> anyhow::Result<()>;
}
