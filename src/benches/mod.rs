
use crate::clock::Clock;
use crate::error::BenchError;
use crate::harness::BenchConfig;
use crate::schema::Measurement;
use crate::store::Store;
use std::collections::BTreeMap;

/// RAM and flash benches over the same sizes.
///
/// Each flash measurement gets a `flash_vs_ram` entry in `extra`: how many
/// times slower its mean was than the RAM fill of the same size.
pub fn suite<C: Clock, S: Store>(
    cfg: &BenchConfig,
    clock: &C,
    store: &S,
    sizes: &[usize],
) -> Result<Vec<Measurement>, BenchError> {
    let mut out = ram::run(cfg, clock, sizes)?;
    let ram_means: BTreeMap<u64, f64> = out.iter().map(|m| (m.payload_bytes, m.mean)).collect();

    let mut flash = flash::run(cfg, clock, store, sizes)?;
    for m in &mut flash {
        let ratio = ram_means
            .get(&m.payload_bytes)
            .filter(|ram| **ram > 0.0)
            .map(|ram| m.mean / ram);
        if let Some(extra) = m.extra.as_object_mut() {
            extra.insert("flash_vs_ram".to_string(), ratio.into());
        }
    }

    out.extend(flash);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::harness::Profile;
    use crate::store::DirStore;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_suite_orders_ram_before_flash() {
        let dir = tempdir().unwrap();
        let store = DirStore::new(dir.path()).unwrap();
        let cfg = BenchConfig {
            pause: Duration::ZERO,
            ..BenchConfig::new(Profile::Quick, 0)
        };

        let out = suite(&cfg, &MonotonicClock::new(), &store, &[8 * 1024]).unwrap();
        let names: Vec<&str> = out.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["ram.fill", "flash.create", "flash.overwrite", "flash.safe_write"]);

        for m in &out[1..] {
            let ratio = &m.extra["flash_vs_ram"];
            assert!(ratio.is_null() || ratio.as_f64().unwrap() >= 0.0);
        }
        assert!(!store.exists(flash::DATA_FILE));
    }
}
