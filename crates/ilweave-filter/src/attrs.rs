//! Explicit trace-marker resolution
//!
//! Markers can sit on the method, its owning property, the declaring class
//! or any enclosing type. Method/property markers are absolute; class
//! markers are resolved by walking the nesting chain outward until one is
//! found ("unknown" defers to the enclosing scope). Class resolution is
//! memoized per fully-qualified type name, since a type's attributes cannot
//! change during a weave run.

use crate::target::{ClassScope, MethodTarget};
use ilweave_model::{TraceAnnotation, TraceTargetVisibility};
use rustc_hash::FxHashMap;
use std::cell::RefCell;

/// A class-level marker after resolution.
#[derive(Debug, Clone, PartialEq)]
enum ClassMarker {
    TraceOn {
        threshold: TraceTargetVisibility,
        parameters: Vec<(String, String)>,
    },
    NoTrace,
}

/// Resolves explicit markers with per-type memoization.
#[derive(Debug, Default)]
pub struct TraceAttributeHelper {
    cache: RefCell<FxHashMap<String, Option<ClassMarker>>>,
}

/// An explicit decision plus any configuration extras to append to the
/// trace payload.
pub type MarkerDecision = (bool, Vec<(String, String)>);

impl TraceAttributeHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Method-level override: a marker directly on the method or, for
    /// accessors, on the owning property. `None` means "no explicit
    /// marker here" and defers to the class tier.
    pub fn method_override(&self, target: &MethodTarget) -> Option<MarkerDecision> {
        Self::first_marker(&target.method_annotations)
            .or_else(|| Self::first_marker(&target.property_annotations))
            .map(|marker| match marker {
                ClassMarker::TraceOn { parameters, .. } => (true, parameters),
                ClassMarker::NoTrace => (false, Vec::new()),
            })
    }

    /// Class-level decision: the nearest enclosing type carrying a marker
    /// decides. `TraceOn` compares the method's visibility against the
    /// marker's threshold; `NoTrace` excludes outright.
    pub fn class_decision(&self, target: &MethodTarget) -> Option<MarkerDecision> {
        for scope in &target.enclosing_classes {
            match self.cached_marker(scope) {
                Some(ClassMarker::NoTrace) => return Some((false, Vec::new())),
                Some(ClassMarker::TraceOn {
                    threshold,
                    parameters,
                }) => {
                    return Some((threshold.admits(target.method_visibility), parameters));
                }
                None => continue,
            }
        }
        None
    }

    fn cached_marker(&self, scope: &ClassScope) -> Option<ClassMarker> {
        if let Some(hit) = self.cache.borrow().get(&scope.full_name) {
            return hit.clone();
        }
        let marker = Self::first_marker(&scope.annotations);
        self.cache
            .borrow_mut()
            .insert(scope.full_name.clone(), marker.clone());
        marker
    }

    fn first_marker(annotations: &[TraceAnnotation]) -> Option<ClassMarker> {
        annotations.iter().find_map(|a| match a {
            TraceAnnotation::TraceOn {
                threshold,
                parameters,
            } => Some(ClassMarker::TraceOn {
                // An unparameterized TraceOn includes every member.
                threshold: threshold.unwrap_or(TraceTargetVisibility::All),
                parameters: parameters.clone(),
            }),
            TraceAnnotation::NoTrace => Some(ClassMarker::NoTrace),
            _ => None,
        })
    }
}
