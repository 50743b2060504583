use tessel_ir::{Data, Global};

use crate::test::helpers::{Field, fusing_runtime, values};
use crate::{ChainOptions, Error, Node, Runtime, SchedulerConfig};

fn unroll(time_unroll: usize) -> ChainOptions {
    ChainOptions::builder().time_unroll(time_unroll).build()
}

fn fused_count(runtime: &Runtime) -> usize {
    runtime.pending_nodes().iter().filter(|node| matches!(node, Node::Fused(_))).count()
}

#[test]
fn test_loops_run_lazily() {
    let runtime = Runtime::default();
    let field = Field::new(3);
    runtime.par_loop(field.bump()).unwrap();
    runtime.par_loop(field.scaled(2.0)).unwrap();

    assert_eq!(runtime.pending(), 2);
    assert_eq!(values(&field.a), vec![0.0, 1.0, 2.0]);

    assert_eq!(runtime.read(&field.a).unwrap().to_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);
    assert_eq!(runtime.pending(), 1);

    assert_eq!(runtime.read(&field.b).unwrap().to_vec::<f64>().unwrap(), vec![2.0, 4.0, 6.0]);
    assert_eq!(runtime.pending(), 0);
}

#[test]
fn test_read_global_forces_its_writers() {
    let runtime = Runtime::default();
    let field = Field::new(4);
    let total = Global::scalar("total", 0.0f64);
    runtime.par_loop(field.total_into(&total)).unwrap();

    assert_eq!(total.value::<f64>(), Some(0.0));
    assert_eq!(runtime.read_global(&total).unwrap().to_vec::<f64>().unwrap(), vec![6.0]);
}

#[test]
fn test_host_write_waits_for_pending_readers() {
    let runtime = Runtime::default();
    let field = Field::new(2);
    runtime.par_loop(field.scaled(5.0)).unwrap();

    runtime.write(&field.a, |a| a.as_mut_slice::<f64>().unwrap().fill(10.0)).unwrap();

    assert_eq!(runtime.pending(), 0);
    assert_eq!(values(&field.b), vec![0.0, 5.0]);
}

#[test]
fn test_chain_fuses_and_matches_unfused() {
    let (runtime, engine) = fusing_runtime();
    let fused = Field::new(6);
    runtime
        .with_loop_chain("step", ChainOptions::default(), |rt| {
            rt.par_loop(fused.bump())?;
            rt.par_loop(fused.scaled(4.0))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(engine.calls(), 1);
    assert_eq!(runtime.pending(), 1);
    assert_eq!(fused_count(&runtime), 1);

    let plain_runtime = Runtime::default();
    let plain = Field::new(6);
    plain_runtime.par_loop(plain.bump()).unwrap();
    plain_runtime.par_loop(plain.scaled(4.0)).unwrap();

    runtime.flush().unwrap();
    plain_runtime.flush().unwrap();
    assert_eq!(values(&fused.a), values(&plain.a));
    assert_eq!(values(&fused.b), values(&plain.b));
}

#[test]
fn test_repeated_chain_reuses_inspector() {
    let (runtime, engine) = fusing_runtime();
    let field = Field::new(2);
    for _ in 0..3 {
        let scope = runtime.loop_chain("step", ChainOptions::default()).unwrap();
        runtime.par_loop(field.bump()).unwrap();
        scope.close().unwrap();
    }

    assert_eq!(engine.calls(), 1);
    assert_eq!(runtime.inspectors().len(), 1);
    assert_eq!(fused_count(&runtime), 3);
    runtime.flush().unwrap();
    assert_eq!(values(&field.a), vec![3.0, 4.0]);
}

#[test]
fn test_time_unroll_fuses_accumulated_steps() {
    let (runtime, engine) = fusing_runtime();
    let field = Field::new(4);

    for step in 0..3 {
        let scope = runtime.loop_chain("ts", unroll(2)).unwrap();
        runtime.par_loop(field.bump()).unwrap();
        runtime.par_loop(field.scaled(2.0)).unwrap();
        scope.close().unwrap();

        match step {
            0 => assert_eq!(runtime.unroll_state().accumulating(), Some(("ts", 0))),
            1 => assert_eq!(runtime.unroll_state().accumulating(), Some(("ts", 2))),
            _ => assert!(runtime.unroll_state().is_idle()),
        }
    }

    assert_eq!(engine.calls(), 1);
    assert_eq!(engine.last().unwrap().loops.len(), 4);
    assert_eq!(runtime.pending(), 3);
    assert_eq!(fused_count(&runtime), 1);

    runtime.flush().unwrap();
    assert_eq!(values(&field.a), vec![3.0, 4.0, 5.0, 6.0]);
    assert_eq!(values(&field.b), vec![6.0, 8.0, 10.0, 12.0]);
}

#[test]
fn test_forced_accumulation_runs_unfused() {
    let (runtime, engine) = fusing_runtime();
    let field = Field::new(2);

    for step in 0..3 {
        let scope = runtime.loop_chain("ts", unroll(2)).unwrap();
        runtime.par_loop(field.bump()).unwrap();
        scope.close().unwrap();
        if step == 1 {
            runtime.force(&Data::from(&field.a)).unwrap();
        }
    }

    assert_eq!(engine.calls(), 1);
    assert_eq!(fused_count(&runtime), 0);
    assert_eq!(runtime.pending(), 1);
    assert!(runtime.unroll_state().is_idle());
    assert_eq!(runtime.read(&field.a).unwrap().to_vec::<f64>().unwrap(), vec![3.0, 4.0]);
}

#[test]
fn test_failed_scope_is_abandoned() {
    let (runtime, engine) = fusing_runtime();
    let field = Field::new(2);

    let result: crate::Result<()> = runtime.with_loop_chain("step", ChainOptions::default(), |rt| {
        rt.par_loop(field.bump())?;
        rt.force(&Data::from(&field.b))?;
        Err(Error::EmptySegment)
    });
    assert!(matches!(result, Err(Error::EmptySegment)));
    assert_eq!(runtime.active_chain(), None);
    assert_eq!(runtime.pending(), 1);
    assert_eq!(engine.calls(), 0);

    runtime.with_loop_chain("step", ChainOptions::default(), |rt| rt.par_loop(field.bump()).map(|_| ())).unwrap();
    assert_eq!(engine.calls(), 1);
}

#[test]
fn test_dropped_scope_restores_context() {
    let runtime = Runtime::default();
    {
        let _scope = runtime.loop_chain("early", ChainOptions::default()).unwrap();
        assert_eq!(runtime.active_chain().as_deref(), Some("early"));
    }
    assert_eq!(runtime.active_chain(), None);
    runtime.loop_chain("next", ChainOptions::default()).unwrap().close().unwrap();
}

#[test]
fn test_chains_do_not_nest() {
    let runtime = Runtime::default();
    let outer = runtime.loop_chain("outer", ChainOptions::default()).unwrap();

    let err = runtime.loop_chain("inner", ChainOptions::default()).unwrap_err();
    assert!(matches!(err, Error::ChainAlreadyOpen { ref active, ref requested } if active == "outer" && requested == "inner"));
    assert_eq!(runtime.active_chain().as_deref(), Some("outer"));
    outer.close().unwrap();
}

#[test]
fn test_kernel_failure_poisons_runtime() {
    let runtime = Runtime::default();
    let field = Field::new(2);
    runtime.par_loop(field.broken()).unwrap();

    assert!(matches!(runtime.flush(), Err(Error::Execution { .. })));
    assert!(runtime.is_poisoned());
    assert!(matches!(runtime.par_loop(field.bump()), Err(Error::TracePoisoned)));
    assert!(matches!(runtime.read(&field.a), Err(Error::TracePoisoned)));
}

#[test]
fn test_runtimes_are_independent() {
    let (first, first_engine) = fusing_runtime();
    let (second, second_engine) = fusing_runtime();
    let field = Field::new(2);

    for runtime in [&first, &second] {
        runtime.with_loop_chain("step", ChainOptions::default(), |rt| rt.par_loop(field.bump()).map(|_| ())).unwrap();
    }

    assert_eq!((first_engine.calls(), second_engine.calls()), (1, 1));
    assert_eq!((first.inspectors().len(), second.inspectors().len()), (1, 1));
    assert_eq!(first.pending(), 1);
}

#[test]
fn test_unconfigured_runtime_never_fuses() {
    let runtime = Runtime::new(SchedulerConfig::default());
    let field = Field::new(2);
    runtime.with_loop_chain("step", ChainOptions::default(), |rt| rt.par_loop(field.bump()).map(|_| ())).unwrap();

    assert_eq!(fused_count(&runtime), 0);
    assert!(runtime.inspectors().is_empty());
}
