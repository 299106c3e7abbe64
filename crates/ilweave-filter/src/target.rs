//! Filter-facing view of a method
//!
//! Filters never see the instruction stream; they decide from the
//! declaration surface only. The weaver builds one [`MethodTarget`] per
//! candidate method while descending the type tree, so the enclosing-class
//! chain (needed for marker walk-up) comes for free.

use ilweave_model::{MethodDef, MethodSemantics, TraceAnnotation, TypeDef, VisibilityLevel};

/// One class in the nesting chain around a method, innermost first.
#[derive(Debug, Clone)]
pub struct ClassScope {
    /// Fully-qualified name (`Ns.Outer/Inner`), used as the memo key.
    pub full_name: String,
    /// Trace annotations declared on the class itself.
    pub annotations: Vec<TraceAnnotation>,
}

/// Everything a filter may consult about one method.
#[derive(Debug, Clone)]
pub struct MethodTarget {
    /// Declaring namespace (the outermost type's namespace).
    pub namespace: String,
    /// Simple name of the declaring class.
    pub class_name: String,
    /// Fully-qualified declaring class name.
    pub class_full_name: String,
    /// Declared visibility of the declaring class.
    pub class_visibility: VisibilityLevel,
    /// Method name (`.ctor`/`.cctor` for constructors).
    pub method_name: String,
    /// Declared visibility of the method.
    pub method_visibility: VisibilityLevel,
    /// Whether the method is static.
    pub is_static: bool,
    /// Accessor/constructor classification.
    pub semantics: MethodSemantics,
    /// Annotations on the method itself.
    pub method_annotations: Vec<TraceAnnotation>,
    /// Annotations on the owning property, for accessors.
    pub property_annotations: Vec<TraceAnnotation>,
    /// Nesting chain: declaring class first, then enclosing types outward.
    pub enclosing_classes: Vec<ClassScope>,
}

impl MethodTarget {
    /// Build a target for `method` declared on `class_def`.
    ///
    /// `namespace` is the declaring namespace (nested types inherit the
    /// outermost type's), `class_full_name` the slash-qualified name, and
    /// `enclosing` the already-visited chain outward of `class_def`
    /// (outermost last).
    pub fn for_method(
        namespace: &str,
        class_full_name: &str,
        class_def: &TypeDef,
        enclosing: &[ClassScope],
        method: &MethodDef,
    ) -> Self {
        let mut chain = Vec::with_capacity(enclosing.len() + 1);
        chain.push(ClassScope {
            full_name: class_full_name.to_string(),
            annotations: class_def.trace_annotations(),
        });
        chain.extend(enclosing.iter().cloned());

        Self {
            namespace: namespace.to_string(),
            class_name: class_def.name.clone(),
            class_full_name: class_full_name.to_string(),
            class_visibility: class_def.visibility_level(),
            method_name: method.name.clone(),
            method_visibility: method.visibility_level(),
            is_static: method.is_static,
            semantics: method.semantics,
            method_annotations: method.trace_annotations(),
            property_annotations: method.property_annotations(),
            enclosing_classes: chain,
        }
    }

    /// `Ns.Type::Method`, as used in trace payloads and diagnostics.
    pub fn signature(&self) -> String {
        format!("{}::{}", self.class_full_name, self.method_name)
    }
}
