use linmem::backing::{FaultyBacking, HeapBacking, MmapBacking};
use linmem::config::{GrowthConfig, GrowthMode, GIB, KIB, MIB, WASM_PAGE_SIZE};
use linmem::policy::GrowthPolicy;
use linmem::region::{GrowthState, MemoryRegion};
use linmem::view::ViewKind;
use linmem::{align_up, GrowthError};

const PAGE: u64 = WASM_PAGE_SIZE;
const MAX: u64 = 2 * GIB - PAGE;

fn wasm_region() -> MemoryRegion<FaultyBacking> {
    let config = GrowthConfig::default()
        .with_page_size(PAGE)
        .with_initial_size(16 * MIB)
        .with_max_size(Some(MAX))
        .geometric(0.2, Some(96 * MIB));
    let mut region = MemoryRegion::new(&config, FaultyBacking::new(HeapBacking::new()))
        .expect("region creation failed");
    region.backing_mut().clear_attempts();
    region
}

#[test]
fn grows_to_requested_size() {
    let mut region = wasm_region();
    region.resize(20 * MIB).expect("resize failed");
    assert_eq!(region.current_size(), 20 * MIB);
    assert_eq!(region.backing().attempted_sizes(), vec![20 * MIB]);
    let view = region.acquire_view();
    assert_eq!(view.len() as u64, 20 * MIB);
}

#[test]
fn resize_to_current_size_is_a_no_op() {
    let mut region = wasm_region();
    region.resize(region.current_size()).expect("no-op resize failed");
    assert_eq!(region.current_size(), 16 * MIB);
    assert!(region.backing().attempts().is_empty());
}

#[test]
fn request_beyond_maximum() {
    let mut region = wasm_region();
    assert_eq!(
        region.resize(MAX + PAGE),
        Err(GrowthError::RequestExceedsMax {
            requested: MAX + PAGE,
            max: MAX
        })
    );
    assert_eq!(region.current_size(), 16 * MIB);
    assert!(region.backing().attempts().is_empty());
}

#[test]
fn degrades_target_after_rejections() {
    let mut region = wasm_region();
    region.backing_mut().fail_next(2);
    let requested = 17 * MIB;

    region.resize(requested).expect("resize failed");

    let policy = GrowthPolicy::new(
        GrowthMode::Geometric {
            factor: 0.2,
            cap: Some(96 * MIB),
        },
        0,
    );
    let expected: Vec<u64> = [1, 2, 4]
        .iter()
        .map(|&cut_down| {
            policy
                .compute(16 * MIB, requested, MAX, PAGE, cut_down, true)
                .expect("request below maximum")
        })
        .collect();
    assert_eq!(region.backing().attempted_sizes(), expected);
    assert!(expected.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(region.current_size(), expected[2]);
    assert!(region.current_size() >= align_up(requested, PAGE));
    assert_eq!(region.state(), GrowthState::Stable);
}

#[test]
fn exhaustion_leaves_region_untouched() {
    let mut region = wasm_region();
    region.backing_mut().fail_always();
    let generation = region.views().generation();
    let view = region.acquire_view();

    let err = region.resize(24 * MIB).unwrap_err();
    assert_eq!(
        err,
        GrowthError::AllocationFailed {
            requested: 24 * MIB,
            current: 16 * MIB,
            attempts: 4
        }
    );
    assert_eq!(region.backing().attempts().len(), 4);
    assert_eq!(region.current_size(), 16 * MIB);
    assert_eq!(region.views().generation(), generation);
    assert_eq!(
        region.view_bytes(&view).map(<[u8]>::len),
        Ok((16 * MIB) as usize)
    );
}

#[test]
fn configurable_retry_count() {
    let config = GrowthConfig::default()
        .with_initial_size(PAGE)
        .with_max_retries(2);
    let mut region = MemoryRegion::new(&config, FaultyBacking::new(HeapBacking::new()))
        .expect("region creation failed");
    region.backing_mut().fail_always();
    assert!(matches!(
        region.resize(2 * PAGE),
        Err(GrowthError::AllocationFailed { attempts: 2, .. })
    ));
}

#[test]
fn quota_limited_backing_settles_below_quota() {
    let mut region = wasm_region();
    // the engine refuses anything above 18 MiB
    region.backing_mut().fail_above(18 * MIB);
    region.resize(17 * MIB).expect("resize failed");
    assert!(region.current_size() >= 17 * MIB);
    assert!(region.current_size() <= 18 * MIB);

    // nothing above the quota can ever succeed
    assert!(matches!(
        region.resize(19 * MIB),
        Err(GrowthError::AllocationFailed { .. })
    ));
}

#[test]
fn invariants_hold_under_random_failures() {
    let page = 4 * KIB;
    let max = MIB;
    let config = GrowthConfig::default()
        .with_page_size(page)
        .with_initial_size(page)
        .with_max_size(Some(max))
        .geometric(0.5, Some(64 * KIB));
    let mut backing = FaultyBacking::new(HeapBacking::new());
    backing.with_failure_rate(0.4, 0x5EED);
    let mut region = MemoryRegion::new(&config, backing).expect("region creation failed");
    let mut rng = fastrand::Rng::with_seed(42);

    let mut previous = region.current_size();
    for _ in 0..500 {
        let requested = rng.u64(0..=max + page);
        let result = region.resize(requested);
        let size = region.current_size();

        assert_eq!(size % page, 0);
        assert!(size <= max);
        assert!(size >= previous);
        match result {
            Ok(()) => assert!(size >= requested),
            Err(GrowthError::RequestExceedsMax { .. }) => {
                assert!(requested > max);
                assert_eq!(size, previous);
            }
            Err(GrowthError::AllocationFailed { .. }) => assert_eq!(size, previous),
        }
        let view = region.acquire_view();
        assert_eq!(view.len() as u64, size);
        previous = size;
    }
}

#[test]
#[cfg_attr(miri, ignore)] // ffi
fn mmap_backed_region() {
    let config = GrowthConfig::default()
        .with_initial_size(PAGE)
        .with_max_size(Some(64 * MIB));
    let mut region = MemoryRegion::new(&config, MmapBacking::new()).expect("region creation failed");
    let view = region.acquire_typed_view(ViewKind::U64);
    region
        .store(&view, 7, u64::MAX - 1)
        .expect("store through fresh view failed");

    region.grow_pages(10).expect("growth failed");
    assert_eq!(region.size_in_pages(), 11);
    let view = region.acquire_typed_view(ViewKind::U64);
    assert_eq!(region.load::<u64>(&view, 7), Ok(u64::MAX - 1));
    assert_eq!(region.load::<u64>(&view, view.len() - 1), Ok(0));
}
