use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tessel_device::{Allocator, Authority, MirrorAllocator};
use tessel_ir::{Access, DType, Dat, Global, Kernel, Map, ParLoop, ParamSpec, Set, Subset};

use super::fixtures::{failing, increment, max_into, scale, sum_pair};
use crate::{Error, execute};

fn values(dat: &Dat) -> Vec<f64> {
    dat.cell().read().unwrap().to_vec::<f64>().unwrap()
}

#[test]
fn test_inc_through_map_counts_sources() {
    let n = 17;
    let cells = Set::new("cells", n);
    let root = Set::new("root", 1);
    let to_root = Map::new("cell2root", &cells, &root, 1, vec![0; n]).unwrap();
    let count = Dat::zeros("count", &root, 1, DType::Float64).unwrap();

    let par_loop = ParLoop::new(&increment(), &cells, [count.arg_via(&to_root, 0, Access::Inc).unwrap()]).unwrap();
    execute(&par_loop).unwrap();

    assert_eq!(values(&count), vec![n as f64]);
}

#[test]
fn test_direct_write() {
    let cells = Set::new("cells", 3);
    let src = Dat::from_vec("src", &cells, 1, vec![1.0f64, 2.0, 3.0]).unwrap();
    let dst = Dat::zeros("dst", &cells, 1, DType::Float64).unwrap();

    let par_loop = ParLoop::new(&scale(2.0), &cells, [src.arg(Access::Read), dst.arg(Access::Write)]).unwrap();
    execute(&par_loop).unwrap();

    assert_eq!(values(&dst), vec![2.0, 4.0, 6.0]);
    assert_eq!(values(&src), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_vector_indirect_read() {
    let edges = Set::new("edges", 2);
    let nodes = Set::new("nodes", 3);
    let edge2node = Map::new("edge2node", &edges, &nodes, 2, vec![0, 1, 1, 2]).unwrap();
    let coords = Dat::from_vec("x", &nodes, 1, vec![1.0f64, 10.0, 100.0]).unwrap();
    let length = Dat::zeros("len", &edges, 1, DType::Float64).unwrap();

    let args = [coords.arg_vec(&edge2node, Access::Read).unwrap(), length.arg(Access::Write)];
    execute(&ParLoop::new(&sum_pair(), &edges, args).unwrap()).unwrap();

    assert_eq!(values(&length), vec![11.0, 110.0]);
}

#[test]
fn test_global_reduction() {
    let cells = Set::new("cells", 4);
    let value = Dat::from_vec("value", &cells, 1, vec![3.0f64, -1.0, 7.5, 2.0]).unwrap();
    let peak = Global::scalar("peak", f64::MIN);

    let par_loop = ParLoop::new(&max_into(), &cells, [value.arg(Access::Read), peak.arg(Access::Max)]).unwrap();
    execute(&par_loop).unwrap();

    assert_eq!(peak.value::<f64>(), Some(7.5));
}

#[test]
fn test_subset_order() {
    let cells = Set::new("cells", 4);
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = Arc::clone(&order);
    let tag = Dat::from_vec("tag", &cells, 1, vec![0i32, 1, 2, 3]).unwrap();
    let kernel = Kernel::from_fn("record", [ParamSpec::input(DType::Int32, 1)], move |slots| {
        seen.lock().push(slots[0].get::<i32>()?[0]);
        Ok(())
    });

    let subset = Subset::new(&cells, vec![3, 1]).unwrap();
    execute(&ParLoop::new(&kernel, subset, [tag.arg(Access::Read)]).unwrap()).unwrap();

    assert_eq!(*order.lock(), vec![3, 1]);
}

#[test]
fn test_core_then_owned_part() {
    let cells = Set::with_core("cells", 5, 2).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let tag = Dat::from_vec("tag", &cells, 1, vec![0i32, 1, 2, 3, 4]).unwrap();
    let kernel = Kernel::from_fn("visit", [ParamSpec::input(DType::Int32, 1)], move |slots| {
        let expected = counter.fetch_add(1, Ordering::SeqCst) as i32;
        assert_eq!(slots[0].get::<i32>()?[0], expected);
        Ok(())
    });

    execute(&ParLoop::new(&kernel, &cells, [tag.arg(Access::Read)]).unwrap()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[test]
fn test_device_authoritative_dat_returns_to_host_after_inc() {
    let cells = Set::new("cells", 2);
    let acc = Dat::from_vec("acc", &cells, 1, vec![1.0f64, 2.0]).unwrap();
    let allocator: Arc<dyn Allocator> = Arc::new(MirrorAllocator::new());
    acc.cell().upload(&allocator).unwrap();
    acc.cell().with_device_mut(|device| device.as_mut_slice::<f64>().unwrap()[0] = 5.0).unwrap();
    assert_eq!(acc.cell().authority(), Authority::Device);

    execute(&ParLoop::new(&increment(), &cells, [acc.arg(Access::Inc)]).unwrap()).unwrap();

    assert_eq!(acc.cell().authority(), Authority::Host);
    assert_eq!(values(&acc), vec![6.0, 3.0]);
}

#[test]
fn test_read_only_dat_is_fetched_and_guarded() {
    let cells = Set::new("cells", 2);
    let src = Dat::from_vec("src", &cells, 1, vec![1.0f64, 2.0]).unwrap();
    let allocator: Arc<dyn Allocator> = Arc::new(MirrorAllocator::new());
    src.cell().upload(&allocator).unwrap();

    let probe = src.clone();
    let kernel = Kernel::from_fn("probe", [ParamSpec::input(DType::Float64, 1)], move |_| {
        assert!(!probe.cell().is_writable());
        assert!(probe.cell().write(|_| ()).is_err());
        Ok(())
    });
    execute(&ParLoop::new(&kernel, &cells, [src.arg(Access::Read)]).unwrap()).unwrap();

    assert_eq!(src.cell().authority(), Authority::Host);
    assert!(src.cell().is_writable());
}

#[test]
fn test_kernel_failure_restores_guard() {
    let cells = Set::new("cells", 3);
    let src = Dat::zeros("src", &cells, 1, DType::Float64).unwrap();

    let result = execute(&ParLoop::new(&failing(), &cells, [src.arg(Access::Read)]).unwrap());

    assert!(matches!(result, Err(Error::Kernel { entity: 0, .. })));
    assert!(src.cell().is_writable());
}

#[test]
fn test_layered_set_unsupported() {
    let columns = Set::layered("columns", 2, 3).unwrap();
    let acc = Dat::zeros("acc", &columns, 1, DType::Float64).unwrap();
    let result = execute(&ParLoop::new(&increment(), &columns, [acc.arg(Access::Inc)]).unwrap());
    assert!(matches!(result, Err(Error::LayeredSetUnsupported { .. })));
}
