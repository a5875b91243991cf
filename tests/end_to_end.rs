// MIT License
//
// Copyright (c) 2026 Raja Lehtihet & Wael El Oraiby
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
//! Cross-module scenarios: the same synthetic traffic mix fed through every
//! sketch engine at once, and the snapshot controller driven the way a
//! fast-path controller would drive it.

use flowsketch::bloom_filter::BloomFilter;
use flowsketch::count_min::CountMin;
use flowsketch::count_sketch::CountSketch;
use flowsketch::elastic_sketch::ElasticSketch;
use flowsketch::flow_key::{FiveTuple, OneTuple, TwoTuple};
use flowsketch::flow_radar::FlowRadar;
use flowsketch::hash_pipe::HashPipe;
use flowsketch::mv_sketch::MVSketch;
use flowsketch::sample_and_hold::SampleAndHold;
use flowsketch::snapshot::{KernelAttachment, LoopbackAttachment, SnapshotBuffer};
use flowsketch::sketch_learn::SketchLearn;
use flowsketch::univmon::{BackendKind, UnivMon};

/// A small, skewed traffic mix: a handful of heavy flows and a long tail of
/// light ones, the shape every heavy-hitter sketch in this crate is built
/// to separate.
struct Traffic {
    heavies: Vec<(TwoTuple, u32)>,
    lights: Vec<(TwoTuple, u32)>,
}

fn skewed_traffic() -> Traffic {
    let heavies = (0..5)
        .map(|i| (TwoTuple::new(10_000 + i, 20_000 + i), 1000))
        .collect();
    let lights = (0..200)
        .map(|i| (TwoTuple::new(30_000 + i, 40_000 + i), 3))
        .collect();
    Traffic { heavies, lights }
}

#[test]
fn every_heavy_hitter_sketch_separates_heavies_from_the_tail() {
    let traffic = skewed_traffic();

    let mut cm = CountMin::<TwoTuple>::new(4, 8192).unwrap();
    let mut hp = HashPipe::<TwoTuple>::new(16384, 8).unwrap();
    let mut es = ElasticSketch::<TwoTuple>::new(4096, 2, 16384, 8).unwrap();
    let mut mv = MVSketch::<TwoTuple>::new(4, 8192).unwrap();
    let mut um = UnivMon::<TwoTuple>::new(6, 16384, BackendKind::CountSketch).unwrap();

    for (flow, count) in traffic.heavies.iter().chain(traffic.lights.iter()) {
        cm.update(flow, *count);
        hp.update(flow, *count);
        es.update(flow, *count);
        mv.update(flow, *count);
        um.update(flow, *count);
    }

    for (heavy, count) in &traffic.heavies {
        assert!(cm.query(heavy) >= u64::from(*count));
        assert!(hp.query(heavy) >= u64::from(*count) / 2);
        assert!(es.query(heavy) >= u64::from(*count) / 2);
        assert!(mv.query(heavy) > 0);
        assert!(um.query(heavy) > 0);
    }
}

#[test]
fn sample_and_hold_keeps_only_the_heaviest_under_the_same_mix() {
    let traffic = skewed_traffic();
    let mut sah = SampleAndHold::<TwoTuple>::new(traffic.heavies.len()).unwrap();

    for (flow, count) in traffic.heavies.iter().chain(traffic.lights.iter()) {
        sah.update(flow, i64::from(*count));
    }

    for (heavy, count) in &traffic.heavies {
        assert_eq!(sah.query(heavy), u64::from(*count));
    }
    assert_eq!(sah.size(), traffic.heavies.len());
}

#[test]
fn flowradar_decodes_the_heavy_set_exactly() {
    let traffic = skewed_traffic();
    let mut fr = FlowRadar::<TwoTuple>::new(16384, 0.3, 3, 3).unwrap();

    for (flow, count) in &traffic.heavies {
        fr.update(flow, *count);
    }

    let decoded = fr.decode();
    for (heavy, count) in &traffic.heavies {
        assert_eq!(decoded.get(heavy).copied(), Some(u64::from(*count)));
    }
}

#[test]
fn sketchlearn_recovers_flows_above_its_threshold() {
    let heavy = OneTuple::new(0x0A00_0001);
    let mut sl = SketchLearn::<OneTuple>::new(1 << 17, 2, 0.15).unwrap();
    for _ in 0..3000 {
        sl.update(&heavy, 1);
    }
    // A handful of light, unrelated flows should not corrupt the heavy
    // recovery: sketch_learn's decode only ever reports flows whose own
    // cells survive cross-validation. Count-Min's never-underestimate
    // guarantee means a colliding light flow can only push the recovered
    // count up, never down, so we check the lower bound rather than exact
    // equality.
    for i in 0..10u32 {
        sl.update(&OneTuple::new(i + 1), 2);
    }
    let recovered = sl.decode().get(&heavy).copied();
    assert!(recovered.is_some_and(|count| count >= 3000), "expected >= 3000, got {recovered:?}");
}

#[test]
fn bloom_filter_has_no_false_negatives_across_a_mixed_stream() {
    let traffic = skewed_traffic();
    let mut bloom = BloomFilter::<TwoTuple>::new(1 << 16, 4).unwrap();
    for (flow, _) in traffic.heavies.iter().chain(traffic.lights.iter()) {
        bloom.update(flow);
    }
    for (flow, _) in traffic.heavies.iter().chain(traffic.lights.iter()) {
        assert!(bloom.query(flow));
    }
}

#[test]
fn five_tuple_flows_work_uniformly_across_every_sketch() {
    let flow = FiveTuple::new(0xC0A8_0101, 0x0A00_0001, 443, 51820, 6);

    let mut cm = CountMin::<FiveTuple>::new(3, 2048).unwrap();
    let mut cs = CountSketch::<FiveTuple>::new(5, 4096).unwrap();
    let mut fr = FlowRadar::<FiveTuple>::new(8192, 0.3, 3, 3).unwrap();

    cm.update(&flow, 42);
    cs.update(&flow, 42);
    fr.update(&flow, 42);

    assert!(cm.query(&flow) >= 42);
    assert!(cs.query(&flow) > 0);
    assert_eq!(fr.query(&flow), 42);
}

/// The double-buffer snapshot scenario from spec.md §8, driven through the
/// [`KernelAttachment`] control-plane surface rather than the bare buffer.
#[test]
fn snapshot_controller_swap_contract_end_to_end() {
    let buffer = SnapshotBuffer::<u32>::new(2, 512).unwrap();
    let mut controller = LoopbackAttachment::new(buffer);
    controller.attach("veth0").unwrap();

    for _ in 0..25 {
        controller.buffer_mut().update(0, 0, 1);
    }
    let frozen = controller.swap().unwrap();
    assert_eq!(controller.buffer().read(0, 0), 25);

    for _ in 0..9 {
        controller.buffer_mut().update(0, 0, 1);
    }
    // Reader's view is still the 25-update snapshot; the writer has moved
    // on to the other buffer.
    assert_eq!(controller.buffer().read(0, 0), 25);

    controller.buffer_mut().clear_buffer(frozen);
    controller.swap().unwrap();
    assert_eq!(controller.buffer().read(0, 0), 9);

    controller.detach();
    assert!(controller.swap().is_err());
}

/// Exercises the `tracing` spans `SnapshotBuffer::swap` and
/// `KernelAttachment::attach`/`detach` emit, through a real subscriber
/// rather than the default no-op one, so a regression that panics inside
/// an instrumented span would surface here.
#[test]
fn snapshot_swap_spans_run_under_a_real_subscriber() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let buffer = SnapshotBuffer::<u32>::new(1, 64).unwrap();
    let mut controller = LoopbackAttachment::new(buffer);
    controller.attach("veth0").unwrap();
    controller.swap().unwrap();
    controller.detach();
}

#[test]
fn configuration_errors_are_rejected_at_construction_across_every_sketch() {
    assert!(CountMin::<TwoTuple>::new(0, 1024).is_err());
    assert!(CountSketch::<TwoTuple>::new(0, 1024).is_err());
    assert!(SampleAndHold::<TwoTuple>::new(0).is_err());
    assert!(HashPipe::<TwoTuple>::new(8192, 0).is_err());
    assert!(MVSketch::<TwoTuple>::new(0, 4096).is_err());
    assert!(ElasticSketch::<TwoTuple>::new(20000, 2, 16384, 8).is_err());
    assert!(FlowRadar::<TwoTuple>::new(8192, 0.0, 3, 3).is_err());
    assert!(UnivMon::<TwoTuple>::new(0, 16384, BackendKind::CountSketch).is_err());
    assert!(SketchLearn::<OneTuple>::new(16, 2, 0.2).is_err());
}
