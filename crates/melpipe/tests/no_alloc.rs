//! Repeated pipeline calls must not touch the heap once the tables exist.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

use melpipe::audio::sine_pcm;
use melpipe::constants::MIN_SAMPLES;
use melpipe::{FeatureMaps, FeaturePipeline};

struct CountingAlloc;

static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    // Only count on the thread under test; the harness allocates elsewhere.
    static ARMED: Cell<bool> = const { Cell::new(false) };
}

fn note_allocation() {
    if ARMED.try_with(Cell::get).unwrap_or(false) {
        ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        note_allocation();
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        note_allocation();
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        note_allocation();
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

#[test]
fn ten_calls_allocate_nothing() {
    let pcm = sine_pcm(440.0, 0.25, MIN_SAMPLES + 1600);
    let mut maps = FeatureMaps::zeroed();

    // First use builds the process-wide tables.
    melpipe::init();
    let pipeline = FeaturePipeline::new();

    let before = ALLOCATIONS.load(Ordering::Relaxed);
    ARMED.with(|a| a.set(true));
    for _ in 0..10 {
        pipeline
            .run(&pcm, &mut maps.mel, &mut maps.conv)
            .expect("run");
    }
    ARMED.with(|a| a.set(false));

    assert_eq!(ALLOCATIONS.load(Ordering::Relaxed), before);
    assert!(maps.all_finite());
}

#[test]
fn rejected_calls_allocate_nothing_either() {
    let pcm = vec![0u8; 100];
    let mut maps = FeatureMaps::zeroed();
    melpipe::init();
    let pipeline = FeaturePipeline::new();
    // Register the rejection log callsite before counting.
    assert!(pipeline.run(&pcm, &mut maps.mel, &mut maps.conv).is_err());

    let before = ALLOCATIONS.load(Ordering::Relaxed);
    ARMED.with(|a| a.set(true));
    let result = pipeline.run(&pcm, &mut maps.mel, &mut maps.conv);
    ARMED.with(|a| a.set(false));

    assert!(result.is_err());
    assert_eq!(ALLOCATIONS.load(Ordering::Relaxed), before);
}
