use crate::outlet::{Outlet, OutletError, OutletFactory, Sample, StreamInfo};
use anyhow::{bail, Result};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-process outlet that records every pushed sample
pub struct MemoryOutlet {
    info: StreamInfo,
    samples: Mutex<Vec<Sample>>,
    rejecting: AtomicBool,
}

impl MemoryOutlet {
    pub fn new(info: StreamInfo) -> Self {
        Self {
            info,
            samples: Mutex::new(Vec::new()),
            rejecting: AtomicBool::new(false),
        }
    }

    /// Samples pushed so far, in push order
    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().clone()
    }

    /// Make subsequent pushes fail with `OutletError::Rejected`
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }
}

impl Outlet for MemoryOutlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn push(&self, sample: Sample) -> Result<(), OutletError> {
        self.info.check_sample(&sample)?;
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(OutletError::Rejected(self.info.name.clone()));
        }
        self.samples.lock().push(sample);
        Ok(())
    }
}

/// Factory for `MemoryOutlet`s; outlets stay reachable by stream name
#[derive(Default)]
pub struct MemoryOutletFactory {
    outlets: DashMap<String, Arc<MemoryOutlet>>,
    unavailable: DashSet<String>,
}

impl MemoryOutletFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make creation of `stream_name` fail
    pub fn mark_unavailable(&self, stream_name: &str) {
        self.unavailable.insert(stream_name.to_string());
    }

    pub fn outlet(&self, stream_name: &str) -> Option<Arc<MemoryOutlet>> {
        self.outlets.get(stream_name).map(|o| Arc::clone(o.value()))
    }

    pub fn outlet_count(&self) -> usize {
        self.outlets.len()
    }
}

impl OutletFactory for MemoryOutletFactory {
    fn create_outlet(&self, info: StreamInfo) -> Result<Arc<dyn Outlet>> {
        if self.unavailable.contains(&info.name) {
            bail!("stream '{}' unavailable", info.name);
        }
        let name = info.name.clone();
        let outlet = Arc::new(MemoryOutlet::new(info));
        self.outlets.insert(name, Arc::clone(&outlet));
        Ok(outlet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_samples_in_order() {
        let outlet = MemoryOutlet::new(StreamInfo::markers("M", "m"));
        outlet.push(Sample::Int32(vec![1])).unwrap();
        outlet.push(Sample::Int32(vec![2])).unwrap();
        assert_eq!(
            outlet.samples(),
            vec![Sample::Int32(vec![1]), Sample::Int32(vec![2])]
        );
    }

    #[test]
    fn test_rejecting_outlet() {
        let outlet = MemoryOutlet::new(StreamInfo::markers("M", "m"));
        outlet.set_rejecting(true);
        assert_eq!(
            outlet.push(Sample::Int32(vec![1])),
            Err(OutletError::Rejected("M".to_string()))
        );
        assert!(outlet.samples().is_empty());
    }

    #[test]
    fn test_factory_unavailable_stream() {
        let factory = MemoryOutletFactory::new();
        factory.mark_unavailable("Sub001_Position");

        assert!(factory
            .create_outlet(StreamInfo::subject_position("001"))
            .is_err());
        assert!(factory
            .create_outlet(StreamInfo::subject_position("002"))
            .is_ok());
        assert_eq!(factory.outlet_count(), 1);
        assert!(factory.outlet("Sub002_Position").is_some());
    }
}
