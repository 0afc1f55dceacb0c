//! Per-bean registry of participating extensions.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::bean::BeanInstaller;
use crate::error::Result;
use crate::extension::{Extension, ExtensionHost, Handler, ScanContext};
use crate::key::{ExtensionKey, TypeKey};

/// One extension taking part in a bean scan.
pub(crate) struct Contributor {
    pub(crate) key: ExtensionKey,
    pub(crate) extension: Arc<dyn Extension>,
    pub(crate) handler: Box<dyn Handler>,
    pub(crate) full_access: bool,
    pub(crate) context: ScanContext,
}

/// Contributors in activation order, at most one per extension.
#[derive(Default)]
pub(crate) struct Contributors {
    entries: Vec<Contributor>,
    index: HashMap<ExtensionKey, usize>,
}

impl Contributors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the contributor for `key`, activating it on first use.
    ///
    /// The preset handler is consumed only when the bean was installed by
    /// this same extension.
    pub(crate) fn compute(
        &mut self,
        key: ExtensionKey,
        host: &dyn ExtensionHost,
        bean_class: TypeKey,
        installer: BeanInstaller,
        preset: &mut Option<Box<dyn Handler>>,
    ) -> Result<usize> {
        if let Some(&existing) = self.index.get(&key) {
            return Ok(existing);
        }

        let extension = host.resolve_or_install_extension(&key)?;
        let full_access = installer == BeanInstaller::Extension(key);

        let mut handler = match (full_access, preset.take()) {
            (true, Some(handler)) => handler,
            (_, unused) => {
                *preset = unused;
                extension.new_handler()
            }
        };

        let context = ScanContext {
            bean_class,
            extension: key,
            installer,
            full_access,
        };
        handler.on_scan_start(&context)?;

        debug!(
            bean = %bean_class,
            extension = extension.name(),
            full_access,
            "Extension activated"
        );

        let position = self.entries.len();
        self.entries.push(Contributor {
            key,
            extension,
            handler,
            full_access,
            context,
        });
        self.index.insert(key, position);
        Ok(position)
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> &mut Contributor {
        &mut self.entries[position]
    }

    /// Notifies every contributor that the scan is over, in activation
    /// order.
    pub(crate) fn finish(&mut self) -> Result<()> {
        for contributor in &mut self.entries {
            contributor.handler.on_scan_end(&contributor.context)?;
            trace!(extension = contributor.extension.name(), "Extension finished");
        }
        Ok(())
    }

    pub(crate) fn activation_order(&self) -> Vec<ExtensionKey> {
        self.entries.iter().map(|c| c.key).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
