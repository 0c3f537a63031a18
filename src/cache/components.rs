//! Harbor components that consume the shared cache.
//!
//! Each component gets its own credential Secret even though they all point
//! at the same cache, so ownership and lifecycle are tracked per consumer.

/// A Harbor component that needs its own cache credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConsumerComponent {
    name: &'static str,
}

impl ConsumerComponent {
    pub const CHART_MUSEUM: Self = Self::new("chartMuseum");
    pub const CLAIR: Self = Self::new("clair");
    pub const JOB_SERVICE: Self = Self::new("jobService");
    pub const REGISTRY: Self = Self::new("registry");

    const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Component name as used in Harbor configuration (e.g. `jobService`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the Secret holding this component's connection URL.
    pub fn secret_name(&self) -> String {
        format!("{}-redis", self.name.to_lowercase())
    }

    /// Property name under which the secret name is reported.
    pub fn property_name(&self) -> String {
        format!("{}Secret", self.name)
    }
}

impl std::fmt::Display for ConsumerComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// All cache consumers, in publication order.
pub const CONSUMER_COMPONENTS: [ConsumerComponent; 4] = [
    ConsumerComponent::CHART_MUSEUM,
    ConsumerComponent::CLAIR,
    ConsumerComponent::JOB_SERVICE,
    ConsumerComponent::REGISTRY,
];
