//! Weave configuration
//!
//! One [`TraceLoggingConfiguration`] drives one weave invocation: which
//! filter decides, which adapter assembly supplies the logging types, and
//! whether constructors/properties are candidates at all. Built through a
//! fluent builder and immutable afterwards.

use crate::engine::{NullTraceFilter, TraceFilter};

/// Default adapter assembly name.
pub const DEFAULT_ADAPTER_ASSEMBLY: &str = "Ilweave.Adapters";
/// Default log-manager type (the static factory the woven `.cctor` calls).
pub const DEFAULT_LOG_MANAGER_TYPE: &str = "Ilweave.Adapters.LogManagerAdapter";
/// Default instance-logger type (receiver of TraceEnter/TraceLeave).
pub const DEFAULT_LOGGER_TYPE: &str = "Ilweave.Adapters.ILoggerAdapter";

/// Immutable per-invocation weave configuration.
#[derive(Debug)]
pub struct TraceLoggingConfiguration {
    filter: Box<dyn TraceFilter>,
    adapter_assembly_name: String,
    log_manager_type: String,
    logger_type: String,
    static_logger_type: Option<String>,
    trace_constructors: bool,
    trace_properties: bool,
}

impl TraceLoggingConfiguration {
    /// Start building a configuration.
    pub fn builder() -> TraceLoggingConfigurationBuilder {
        TraceLoggingConfigurationBuilder::default()
    }

    /// The active filter.
    pub fn filter(&self) -> &dyn TraceFilter {
        self.filter.as_ref()
    }

    /// Simple name of the logging-adapter assembly.
    pub fn adapter_assembly_name(&self) -> &str {
        &self.adapter_assembly_name
    }

    /// Full name of the log-manager (factory) type.
    pub fn log_manager_type(&self) -> &str {
        &self.log_manager_type
    }

    /// Full name of the instance-logger type.
    pub fn logger_type(&self) -> &str {
        &self.logger_type
    }

    /// Full name of the static logging façade whose calls get redirected,
    /// when configured.
    pub fn static_logger_type(&self) -> Option<&str> {
        self.static_logger_type.as_deref()
    }

    /// Whether constructors are trace candidates.
    pub fn trace_constructors(&self) -> bool {
        self.trace_constructors
    }

    /// Whether property accessors are trace candidates.
    pub fn trace_properties(&self) -> bool {
        self.trace_properties
    }
}

/// Fluent builder for [`TraceLoggingConfiguration`].
#[derive(Debug)]
pub struct TraceLoggingConfigurationBuilder {
    filter: Box<dyn TraceFilter>,
    adapter_assembly_name: String,
    log_manager_type: String,
    logger_type: String,
    static_logger_type: Option<String>,
    trace_constructors: bool,
    trace_properties: bool,
}

impl Default for TraceLoggingConfigurationBuilder {
    fn default() -> Self {
        Self {
            filter: Box::new(NullTraceFilter),
            adapter_assembly_name: DEFAULT_ADAPTER_ASSEMBLY.to_string(),
            log_manager_type: DEFAULT_LOG_MANAGER_TYPE.to_string(),
            logger_type: DEFAULT_LOGGER_TYPE.to_string(),
            static_logger_type: None,
            trace_constructors: false,
            trace_properties: true,
        }
    }
}

impl TraceLoggingConfigurationBuilder {
    /// Set the filter strategy.
    pub fn with_filter(mut self, filter: Box<dyn TraceFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Override the adapter assembly name.
    pub fn with_adapter_assembly(mut self, name: impl Into<String>) -> Self {
        self.adapter_assembly_name = name.into();
        self
    }

    /// Override the log-manager type full name.
    pub fn with_log_manager(mut self, full_name: impl Into<String>) -> Self {
        self.log_manager_type = full_name.into();
        self
    }

    /// Override the instance-logger type full name.
    pub fn with_logger(mut self, full_name: impl Into<String>) -> Self {
        self.logger_type = full_name.into();
        self
    }

    /// Enable static-façade call redirection for the given type.
    pub fn with_static_logger(mut self, full_name: impl Into<String>) -> Self {
        self.static_logger_type = Some(full_name.into());
        self
    }

    /// Include constructors as trace candidates.
    pub fn trace_constructors(mut self, enabled: bool) -> Self {
        self.trace_constructors = enabled;
        self
    }

    /// Include property accessors as trace candidates.
    pub fn trace_properties(mut self, enabled: bool) -> Self {
        self.trace_properties = enabled;
        self
    }

    /// Finish building.
    pub fn build(self) -> TraceLoggingConfiguration {
        TraceLoggingConfiguration {
            filter: self.filter,
            adapter_assembly_name: self.adapter_assembly_name,
            log_manager_type: self.log_manager_type,
            logger_type: self.logger_type,
            static_logger_type: self.static_logger_type,
            trace_constructors: self.trace_constructors,
            trace_properties: self.trace_properties,
        }
    }
}
