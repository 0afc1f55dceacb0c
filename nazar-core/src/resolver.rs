//! Parameter resolution and the deferred operation queue.
//!
//! Every operation a scan creates is queued. Draining the queue resolves
//! each unbound parameter in this order:
//!
//! 1. a parameter marker whose hook binds parameters;
//! 2. a binding hook registered for the parameter's type;
//! 3. a service lookup in the bean's namespace.
//!
//! Extensions may create further operations while binding, which are
//! queued behind the current ones. The queue is drained to a fixed point,
//! bounded by [`ScanSettings::max_deferred_operations`].
//!
//! [`ScanSettings::max_deferred_operations`]: crate::settings::ScanSettings

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::binding::BindingSlot;
use crate::class::ParameterDescriptor;
use crate::error::{NazarError, Result};
use crate::hook::HookDescriptor;
use crate::key::{DependencyKey, ExtensionKey};
use crate::marker::MarkerInstance;
use crate::operation::OperationId;
use crate::scanner::{BeanScanner, OperationSink};

/// Names the operation a missing service was needed for.
fn required_by(err: NazarError, target: impl FnOnce() -> String) -> NazarError {
    match err {
        NazarError::NotRegistered(mut inner) => {
            inner.required_by.get_or_insert_with(target);
            NazarError::NotRegistered(inner)
        }
        other => other,
    }
}

impl BeanScanner<'_> {
    /// Resolves queued operations until the queue is empty.
    pub(crate) fn drain(&mut self) -> Result<()> {
        let limit = self.host.settings().max_deferred_operations;

        while let Some(id) = self.queue.pop_front() {
            self.processed += 1;
            if self.processed > limit {
                warn!(bean = %self.bean_class, limit, "Deferred resolution did not converge");
                return Err(NazarError::ResolutionLimitExceeded {
                    class: self.bean_class,
                    limit,
                });
            }
            self.resolve_operation(id)?;
        }
        Ok(())
    }

    fn resolve_operation(&mut self, id: OperationId) -> Result<()> {
        let parameters = self.bean.operations[id.0].parameters().to_vec();

        for (index, parameter) in parameters.iter().enumerate() {
            if self.bean.operations[id.0].binding(index).is_some() {
                continue;
            }
            self.resolve_parameter(id, index, parameter)?;
        }

        trace!(operation = %self.bean.operations[id.0].target(), "Operation resolved");
        Ok(())
    }

    fn resolve_parameter(
        &mut self,
        id: OperationId,
        index: usize,
        parameter: &ParameterDescriptor,
    ) -> Result<()> {
        let host = self.host;
        let catalog = host.catalog();

        let mut found: Option<(MarkerInstance, Arc<HookDescriptor>)> = None;
        for marker in &parameter.markers {
            let Some(hook) = self.model.lookup(catalog, &marker.key())? else {
                continue;
            };
            if !hook.capabilities.binding {
                trace!(parameter = parameter.name, marker = %marker.key(), "Member hook on a parameter, skipped");
                continue;
            }
            if let Some((first, _)) = &found {
                return Err(NazarError::DuplicateBindingHook {
                    target: format!(
                        "Parameter {index} ({}) of {}",
                        parameter.name,
                        self.bean.operations[id.0].target()
                    ),
                    first: first.key(),
                    second: marker.key(),
                });
            }
            found = Some((marker.clone(), hook));
        }

        if let Some((marker, hook)) = found {
            return self.delegate(id, index, parameter, hook.extension, Some(marker));
        }

        if let Some(extension) = catalog.type_hook(&parameter.ty) {
            return self.delegate(id, index, parameter, extension, None);
        }

        let key = DependencyKey::for_type(parameter.ty);
        let binding = host
            .lookup_service(&self.namespace, &key, !parameter.optional)
            .map_err(|err| required_by(err, || self.bean.operations[id.0].target()))?;

        debug!(
            operation = %self.bean.operations[id.0].target(),
            index,
            service = %key,
            "Parameter bound to service"
        );
        self.bean.operations[id.0].set_binding(index, binding)
    }

    /// Hands an unbound parameter to `extension` and checks that it was
    /// bound.
    fn delegate(
        &mut self,
        id: OperationId,
        index: usize,
        parameter: &ParameterDescriptor,
        extension: ExtensionKey,
        marker: Option<MarkerInstance>,
    ) -> Result<()> {
        let position = self.activate(extension)?;
        let contributor = self.contributors.get_mut(position);

        let mut slot = BindingSlot::new(
            OperationSink {
                bean: &mut *self.bean,
                queue: &mut self.queue,
                host: self.host,
            },
            id,
            index,
            parameter.clone(),
            marker,
            extension,
            self.namespace,
        );
        contributor
            .handler
            .on_binding_requested(&mut slot)
            .map_err(|err| required_by(err, || slot.operation().target()))?;

        if !slot.is_bound() {
            let operation = slot.operation().target();
            warn!(extension = %extension, operation = %operation, index, "Binding request left unbound");
            return Err(NazarError::BindingNotSet {
                extension,
                operation,
                index,
            });
        }
        Ok(())
    }
}
