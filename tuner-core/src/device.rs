//! # Input Device Selection
//!
//! Picking a microphone is an ordered list of strategies tried one after the
//! other: the device the user asked for, then the system default, then the
//! first input device that exists. Each step is a plain function over a
//! [`DeviceCatalog`] so the chain can be exercised without audio hardware.

use std::fmt;

/// Read-only view of the input devices a host offers.
pub trait DeviceCatalog {
    type Device;

    /// The host's default input device, if it reports one.
    fn default_input(&self) -> Option<Self::Device>;

    /// All input devices in host order.
    fn inputs(&self) -> Vec<Self::Device>;

    /// Human-readable device name, `None` if the host cannot provide one.
    fn name_of(&self, device: &Self::Device) -> Option<String>;
}

/// One step of the device fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStrategy {
    /// The input device with exactly this name.
    Named(String),
    SystemDefault,
    FirstAvailable,
}

impl fmt::Display for DeviceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStrategy::Named(name) => write!(f, "requested device '{name}'"),
            DeviceStrategy::SystemDefault => f.write_str("system default"),
            DeviceStrategy::FirstAvailable => f.write_str("first available"),
        }
    }
}

impl DeviceStrategy {
    /// Tries this single step against the catalog.
    pub fn resolve<C: DeviceCatalog>(&self, catalog: &C) -> Option<C::Device> {
        match self {
            DeviceStrategy::Named(name) => find_named(catalog, name),
            DeviceStrategy::SystemDefault => catalog.default_input(),
            DeviceStrategy::FirstAvailable => catalog.inputs().into_iter().next(),
        }
    }
}

/// The strategies to try, in order, for an optional requested device name.
pub fn fallback_chain(requested: Option<&str>) -> Vec<DeviceStrategy> {
    let mut chain = Vec::with_capacity(3);
    if let Some(name) = requested {
        chain.push(DeviceStrategy::Named(name.to_string()));
    }
    chain.push(DeviceStrategy::SystemDefault);
    chain.push(DeviceStrategy::FirstAvailable);
    chain
}

/// Walks the fallback chain until a device is found *and* opens.
///
/// A strategy counts as failed when it resolves no device or when `open`
/// rejects the device it resolved (e.g. the device refuses every stream
/// format); the walk then moves on to the next step. Returns the strategy,
/// the device and whatever `open` produced, or `None` once the chain is
/// exhausted.
///
/// # Arguments
/// * `catalog` - The devices to choose from
/// * `requested` - Device name asked for by the user, if any
/// * `open` - Tries to start capturing from a resolved device
pub fn open_first<C, T, E, F>(
    catalog: &C,
    requested: Option<&str>,
    mut open: F,
) -> Option<(DeviceStrategy, C::Device, T)>
where
    C: DeviceCatalog,
    E: fmt::Display,
    F: FnMut(&C::Device) -> Result<T, E>,
{
    for strategy in fallback_chain(requested) {
        let Some(device) = strategy.resolve(catalog) else {
            log::debug!("No input device from {strategy}, trying next");
            continue;
        };
        match open(&device) {
            Ok(opened) => return Some((strategy, device, opened)),
            Err(e) => {
                let name = catalog.name_of(&device);
                log::warn!(
                    "Cannot open {} ({strategy}): {e}",
                    name.as_deref().unwrap_or("<unnamed>")
                );
            }
        }
    }
    None
}

/// The input device whose name matches exactly.
pub fn find_named<C: DeviceCatalog>(catalog: &C, name: &str) -> Option<C::Device> {
    catalog
        .inputs()
        .into_iter()
        .find(|device| catalog.name_of(device).as_deref() == Some(name))
}

/// Names of every input device, skipping unnamed ones.
pub fn device_names<C: DeviceCatalog>(catalog: &C) -> Vec<String> {
    catalog
        .inputs()
        .iter()
        .filter_map(|device| catalog.name_of(device))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCatalog {
        default: Option<&'static str>,
        inputs: Vec<&'static str>,
    }

    impl DeviceCatalog for FakeCatalog {
        type Device = &'static str;

        fn default_input(&self) -> Option<Self::Device> {
            self.default
        }

        fn inputs(&self) -> Vec<Self::Device> {
            self.inputs.clone()
        }

        fn name_of(&self, device: &Self::Device) -> Option<String> {
            Some(device.to_string())
        }
    }

    fn catalog(default: Option<&'static str>, inputs: &[&'static str]) -> FakeCatalog {
        FakeCatalog {
            default,
            inputs: inputs.to_vec(),
        }
    }

    #[test]
    fn chain_order() {
        assert_eq!(
            fallback_chain(Some("USB")),
            [
                DeviceStrategy::Named("USB".into()),
                DeviceStrategy::SystemDefault,
                DeviceStrategy::FirstAvailable
            ]
        );
        assert_eq!(fallback_chain(None).len(), 2);
    }

    /// Runs the chain, with every device in `broken` refusing to open.
    fn chosen(
        c: &FakeCatalog,
        requested: Option<&str>,
        broken: &[&'static str],
    ) -> Option<(DeviceStrategy, &'static str)> {
        let open = |device: &&'static str| {
            if broken.contains(device) {
                Err(format!("{device} refuses the stream"))
            } else {
                Ok(())
            }
        };
        open_first(c, requested, open).map(|(strategy, device, ())| (strategy, device))
    }

    #[test]
    fn requested_device_wins() {
        let c = catalog(Some("Built-in"), &["Built-in", "USB"]);
        assert_eq!(
            chosen(&c, Some("USB"), &[]),
            Some((DeviceStrategy::Named("USB".into()), "USB"))
        );
    }

    #[test]
    fn unknown_request_falls_back_to_default() {
        let c = catalog(Some("Built-in"), &["Built-in", "USB"]);
        assert_eq!(
            chosen(&c, Some("Gone"), &[]),
            Some((DeviceStrategy::SystemDefault, "Built-in"))
        );
    }

    #[test]
    fn device_that_fails_to_open_falls_back_to_default() {
        let c = catalog(Some("Built-in"), &["Built-in", "USB"]);
        assert_eq!(
            chosen(&c, Some("USB"), &["USB"]),
            Some((DeviceStrategy::SystemDefault, "Built-in"))
        );
    }

    #[test]
    fn broken_default_falls_back_to_first_input() {
        let c = catalog(Some("Line"), &["USB", "Line"]);
        assert_eq!(
            chosen(&c, None, &["Line"]),
            Some((DeviceStrategy::FirstAvailable, "USB"))
        );
    }

    #[test]
    fn missing_default_falls_back_to_first_input() {
        let c = catalog(None, &["USB", "Line"]);
        assert_eq!(
            chosen(&c, None, &[]),
            Some((DeviceStrategy::FirstAvailable, "USB"))
        );
    }

    #[test]
    fn no_devices_selects_nothing() {
        assert_eq!(chosen(&catalog(None, &[]), Some("USB"), &[]), None);
        let c = catalog(Some("USB"), &["USB"]);
        assert_eq!(chosen(&c, Some("USB"), &["USB"]), None);
    }

    #[test]
    fn lists_device_names() {
        assert_eq!(device_names(&catalog(None, &["A", "B"])), ["A", "B"]);
    }
}
