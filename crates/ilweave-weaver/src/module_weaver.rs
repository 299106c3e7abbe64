//! Module- and type-level orchestration
//!
//! One [`ModuleWeaver`] drives one weave invocation: it flattens the type
//! tree (building the enclosing-class chains the filter's marker walk-up
//! needs), queries the filter per method, dispatches to the matching body
//! rewriter, and maintains the per-type logger field. The walk is split
//! into an immutable planning pass and a mutating application pass so the
//! async rewriter can touch a kickoff method and its state-machine type in
//! separate borrows of the module.

use crate::classify::{classify, MethodKind};
use crate::emit::{self, AdapterRefs, START_TICK_FIELD_NAME};
use crate::error::{WeaveError, WeaveResult};
use crate::logger;
use crate::rewrite::{async_method, log_calls, ordinary, TraceCallContext};
use ilweave_filter::{ClassScope, FilterResult, MethodTarget, TraceLoggingConfiguration};
use ilweave_model::{
    CilType, FieldDef, FieldRef, MethodDef, MethodSemantics, ModuleDef, Opcode, Operand,
    TraceAnnotation, TypeDef,
};
use tracing::{debug, warn};

/// Counters reported from one module weave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaveStats {
    /// Methods that received enter/leave tracing.
    pub methods_traced: usize,
    /// Static façade calls redirected to the instance logger.
    pub log_calls_redirected: usize,
    /// Methods skipped by the idempotence guard.
    pub methods_skipped: usize,
}

struct MethodPlan {
    index: usize,
    signature: String,
    decision: FilterResult,
    kind: MethodKind,
}

struct TypePlan {
    path: String,
    methods: Vec<MethodPlan>,
}

/// Weaves one in-memory module per invocation. Fail-fast: any error aborts
/// the weave and the caller must discard the module.
#[derive(Debug)]
pub struct ModuleWeaver<'a> {
    config: &'a TraceLoggingConfiguration,
    adapter: AdapterRefs,
}

impl<'a> ModuleWeaver<'a> {
    /// Build a weaver over a configuration.
    pub fn new(config: &'a TraceLoggingConfiguration) -> Self {
        Self {
            config,
            adapter: AdapterRefs::from_config(config),
        }
    }

    /// Weave the module in place.
    pub fn weave(&self, module: &mut ModuleDef) -> WeaveResult<WeaveStats> {
        module.ensure_assembly_ref(self.config.adapter_assembly_name());

        let plans = self.plan(module);
        let mut stats = WeaveStats::default();
        for plan in &plans {
            self.apply_type(module, plan, &mut stats)?;
        }
        debug!(
            module = module.name.as_str(),
            traced = stats.methods_traced,
            redirected = stats.log_calls_redirected,
            skipped = stats.methods_skipped,
            "module weave complete"
        );
        Ok(stats)
    }

    fn plan(&self, module: &ModuleDef) -> Vec<TypePlan> {
        let mut plans = Vec::new();
        for ty in &module.types {
            self.plan_type(module, ty, &ty.namespace, &ty.full_name(), &[], &mut plans);
        }
        plans
    }

    fn plan_type(
        &self,
        module: &ModuleDef,
        ty: &TypeDef,
        namespace: &str,
        path: &str,
        enclosing: &[ClassScope],
        out: &mut Vec<TypePlan>,
    ) {
        let compiler_generated = ty
            .trace_annotations()
            .iter()
            .any(|a| matches!(a, TraceAnnotation::CompilerGenerated));
        if !ty.is_interface && !compiler_generated {
            let mut methods = Vec::new();
            for (index, method) in ty.methods.iter().enumerate() {
                if !method.has_body() {
                    continue;
                }
                if method.semantics == MethodSemantics::StaticConstructor {
                    continue;
                }
                let candidate = match method.semantics {
                    MethodSemantics::Constructor => self.config.trace_constructors(),
                    MethodSemantics::Getter | MethodSemantics::Setter => {
                        self.config.trace_properties()
                    }
                    _ => true,
                };
                let target = MethodTarget::for_method(namespace, path, ty, enclosing, method);
                let decision = if candidate {
                    self.config.filter().should_trace(&target)
                } else {
                    FilterResult::skip()
                };
                let kind = classify(method);
                if !decision.should_trace && !self.needs_redirection(module, method, &kind) {
                    continue;
                }
                methods.push(MethodPlan {
                    index,
                    signature: target.signature(),
                    decision,
                    kind,
                });
            }
            if !methods.is_empty() {
                out.push(TypePlan {
                    path: path.to_string(),
                    methods,
                });
            }
        }

        let mut chain = Vec::with_capacity(enclosing.len() + 1);
        chain.push(ClassScope {
            full_name: path.to_string(),
            annotations: ty.trace_annotations(),
        });
        chain.extend_from_slice(enclosing);
        for nested in &ty.nested {
            let nested_path = format!("{}/{}", path, nested.name);
            self.plan_type(module, nested, namespace, &nested_path, &chain, out);
        }
    }

    /// Whether a filter-excluded method still needs a rewrite pass for
    /// façade-call redirection. For async methods the user's log calls live
    /// in the generated driver body.
    fn needs_redirection(&self, module: &ModuleDef, method: &MethodDef, kind: &MethodKind) -> bool {
        let Some(facade) = self.config.static_logger_type() else {
            return false;
        };
        match kind {
            MethodKind::Ordinary => body_calls_facade(method, facade),
            MethodKind::Async { state_machine_type } => module
                .find_type(state_machine_type)
                .and_then(|sm| sm.method("MoveNext"))
                .map(|mv| body_calls_facade(mv, facade))
                .unwrap_or(false),
        }
    }

    fn apply_type(
        &self,
        module: &mut ModuleDef,
        plan: &TypePlan,
        stats: &mut WeaveStats,
    ) -> WeaveResult<()> {
        let logger_field = {
            let Some(ty) = module.find_type_mut(&plan.path) else {
                warn!(path = plan.path.as_str(), "planned type not found, skipping");
                return Ok(());
            };
            logger::ensure_logger_field(ty, &plan.path, &self.adapter)?
        };

        for method_plan in &plan.methods {
            match &method_plan.kind {
                MethodKind::Ordinary => {
                    self.apply_ordinary(module, plan, method_plan, &logger_field, stats)?;
                }
                MethodKind::Async { state_machine_type } => {
                    self.apply_async(
                        module,
                        plan,
                        method_plan,
                        state_machine_type,
                        &logger_field,
                        stats,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn apply_ordinary(
        &self,
        module: &mut ModuleDef,
        plan: &TypePlan,
        method_plan: &MethodPlan,
        logger_field: &FieldRef,
        stats: &mut WeaveStats,
    ) -> WeaveResult<()> {
        let Some(ty) = module.find_type_mut(&plan.path) else {
            return Ok(());
        };
        let Some(method) = ty.methods.get_mut(method_plan.index) else {
            return Ok(());
        };
        if logger::already_woven(method, logger_field) {
            stats.methods_skipped += 1;
            return Ok(());
        }

        let ctx = TraceCallContext {
            signature: method_plan.signature.clone(),
            adapter: &self.adapter,
            logger_field: logger_field.clone(),
            extras: method_plan.decision.parameters.clone(),
        };
        if method_plan.decision.should_trace {
            debug!(signature = method_plan.signature.as_str(), "weaving trace");
            ordinary::weave_trace(method, &ctx)?;
            stats.methods_traced += 1;
        }
        if let Some(facade) = self.config.static_logger_type() {
            if let Some(body) = method.body.as_mut() {
                stats.log_calls_redirected += log_calls::redirect_facade_calls(
                    body,
                    &method_plan.signature,
                    facade,
                    &self.adapter,
                    logger_field,
                )?;
            }
        }
        Ok(())
    }

    fn apply_async(
        &self,
        module: &mut ModuleDef,
        plan: &TypePlan,
        method_plan: &MethodPlan,
        state_machine_type: &str,
        logger_field: &FieldRef,
        stats: &mut WeaveStats,
    ) -> WeaveResult<()> {
        // Validate the state-machine shape before mutating anything.
        {
            let Some(sm) = module.find_type(state_machine_type) else {
                return Err(WeaveError::StateMachineTypeNotFound {
                    type_name: state_machine_type.to_string(),
                    method: method_plan.signature.clone(),
                });
            };
            if sm.method("MoveNext").is_none() {
                return Err(WeaveError::MoveNextNotFound {
                    type_name: state_machine_type.to_string(),
                });
            }
        }
        {
            let Some(ty) = module.find_type(&plan.path) else {
                return Ok(());
            };
            let Some(method) = ty.methods.get(method_plan.index) else {
                return Ok(());
            };
            if logger::already_woven(method, logger_field) {
                stats.methods_skipped += 1;
                return Ok(());
            }
        }

        let ctx = TraceCallContext {
            signature: method_plan.signature.clone(),
            adapter: &self.adapter,
            logger_field: logger_field.clone(),
            extras: method_plan.decision.parameters.clone(),
        };

        if method_plan.decision.should_trace {
            debug!(
                signature = method_plan.signature.as_str(),
                state_machine = state_machine_type,
                "weaving async trace"
            );
            // Thread the start tick through a new instance field on the
            // state machine.
            let tick_field = {
                let Some(sm) = module.find_type_mut(state_machine_type) else {
                    return Err(WeaveError::StateMachineTypeNotFound {
                        type_name: state_machine_type.to_string(),
                        method: method_plan.signature.clone(),
                    });
                };
                if sm.field(START_TICK_FIELD_NAME).is_none() {
                    sm.fields.push(FieldDef {
                        name: START_TICK_FIELD_NAME.to_string(),
                        ty: CilType::I8,
                        is_static: false,
                    });
                }
                FieldRef {
                    declaring_type: emit::declared_ref(sm, state_machine_type),
                    name: START_TICK_FIELD_NAME.to_string(),
                    ty: CilType::I8,
                }
            };

            {
                let Some(ty) = module.find_type_mut(&plan.path) else {
                    return Ok(());
                };
                let Some(method) = ty.methods.get_mut(method_plan.index) else {
                    return Ok(());
                };
                async_method::weave_kickoff(method, state_machine_type, &tick_field, &ctx)?;
            }
            {
                let Some(sm) = module.find_type_mut(state_machine_type) else {
                    return Ok(());
                };
                let Some(move_next) = sm.method_mut("MoveNext") else {
                    return Ok(());
                };
                async_method::weave_move_next(move_next, &tick_field, &ctx)?;
            }
            stats.methods_traced += 1;
        }

        // User log statements relocate into the driver during the async
        // transform, so redirection targets MoveNext.
        if let Some(facade) = self.config.static_logger_type() {
            let Some(sm) = module.find_type_mut(state_machine_type) else {
                return Ok(());
            };
            if let Some(move_next) = sm.method_mut("MoveNext") {
                if let Some(body) = move_next.body.as_mut() {
                    stats.log_calls_redirected += log_calls::redirect_facade_calls(
                        body,
                        &method_plan.signature,
                        facade,
                        &self.adapter,
                        logger_field,
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn body_calls_facade(method: &MethodDef, facade_full_name: &str) -> bool {
    let Some(body) = method.body.as_ref() else {
        return false;
    };
    body.instructions().any(|(_, instr)| {
        instr.opcode == Opcode::Call
            && matches!(
                &instr.operand,
                Operand::Method(m) if m.declaring_type.full_name() == facade_full_name
            )
    })
}
