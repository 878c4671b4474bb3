//! DST tests for the kernel loop
//!
//! TigerStyle: The real tick loop over simulated time, stop conditions checked.
//!
//! Properties:
//! - Every LIVE pass is followed by one tick interval of simulated time
//! - The loop stops on its tick budget, on request, or once the tree is idle
//! - A stopped kernel has ended every entity it activated

use holon_core::config::SchedulerConfig;
use holon_core::error::{Error, Result};
use holon_dst::{
    FaultConfig, FaultType, SimAgent, SimConfig, SimEnvironment, Simulation, OPERATION_CALLBACK,
};
use holon_runtime::activation::{ActivationParams, Activator, ActivatorNode, LifecyclePhase};
use holon_runtime::kernel::Kernel;
use std::sync::Arc;

const AGENTS_COUNT: usize = 4;

fn group(
    env: &SimEnvironment,
    name: &str,
) -> Result<(Arc<Activator<SimAgent>>, Vec<Arc<SimAgent>>)> {
    let group = Arc::new(Activator::<SimAgent>::new(name));
    let mut agents = Vec::with_capacity(AGENTS_COUNT);
    for i in 0..AGENTS_COUNT {
        let agent = env.agent(&format!("{}-{}", name, i))?;
        group.add_member(agent.clone())?;
        agents.push(agent);
    }
    Ok((group, agents))
}

fn bounded(ticks_count_max: u64) -> SchedulerConfig {
    SchedulerConfig {
        ticks_count_max: Some(ticks_count_max),
        stop_when_idle: false,
        ..SchedulerConfig::default()
    }
}

fn assert_all_ended(agents: &[Arc<SimAgent>]) {
    for agent in agents {
        assert_eq!(agent.phase(), LifecyclePhase::Terminated, "{}", agent.address());
    }
}

async fn wait_for_ticks<N>(kernel: &Kernel<N>, ticks: u64)
where
    N: ActivatorNode + ?Sized + 'static,
{
    while kernel.ticks() < ticks {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Stop Conditions
// =============================================================================

#[test]
fn test_dst_kernel_run_advances_simulated_time() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config).run(|env| async move {
        let (root, agents) = group(&env, "paced")?;
        let kernel = env.kernel(root, bounded(20))?;
        let interval_ms = kernel.config().tick_interval_ms;

        let started_ms = env.now_ms();
        let report = kernel.run(&ActivationParams::empty()).await?;

        assert_eq!(report.ticks, 20);
        assert_eq!(kernel.ticks(), 20);
        assert_eq!(env.now_ms() - started_ms, 20 * interval_ms);
        assert!(!kernel.is_running());
        assert_all_ended(&agents);
        Ok(report)
    });

    let report = result.expect("kernel run succeeds");
    assert!(!report.activation.is_failure());
    assert!(report.last_tick.is_some());
    assert!(!report.destruction.is_failure());
}

#[test]
fn test_dst_kernel_handle_stop() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config).run(|env| async move {
        let (root, agents) = group(&env, "stopped")?;
        let kernel = env.kernel(
            root,
            SchedulerConfig {
                stop_when_idle: false,
                ..SchedulerConfig::default()
            },
        )?;

        let handle = kernel.start(&ActivationParams::empty())?;
        wait_for_ticks(&kernel, 5).await;
        let report = handle.stop().await?;

        assert!(report.ticks >= 5);
        assert_eq!(report.ticks, kernel.ticks());
        assert!(!kernel.is_running());
        assert_all_ended(&agents);
        Ok(())
    });

    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_dst_kernel_stops_when_idle() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config).run(|env| async move {
        let (root, agents) = group(&env, "idle")?;
        let kernel = env.kernel(root.clone(), SchedulerConfig::default())?;
        assert!(!kernel.is_idle());

        let handle = kernel.start(&ActivationParams::empty())?;
        wait_for_ticks(&kernel, 3).await;
        root.remove_all_members();
        let report = handle.join().await?;

        assert!(report.ticks >= 3);
        assert!(kernel.is_idle());
        assert!(root.is_empty());
        assert_all_ended(&agents);
        Ok(())
    });

    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_dst_kernel_unused_tree_is_not_idle() {
    let result = Simulation::new(SimConfig::new(11)).run(|env| async move {
        let root = Arc::new(Activator::<SimAgent>::new("empty"));
        let config = SchedulerConfig {
            ticks_count_max: Some(7),
            ..SchedulerConfig::default()
        };
        let kernel = env.kernel(root, config)?;

        // Never used, so only the tick budget stops it
        let report = kernel.run(&ActivationParams::empty()).await?;
        assert_eq!(report.ticks, 7);
        assert!(!kernel.is_idle());
        Ok(())
    });

    assert!(result.is_ok(), "{:?}", result.err());
}

// =============================================================================
// Faults and Partitions
// =============================================================================

#[test]
fn test_dst_kernel_run_with_callback_faults() {
    let config = SimConfig::from_env_or_random();

    let result = Simulation::new(config)
        .with_fault(
            FaultConfig::new(FaultType::CallbackError, 0.1).with_filter(OPERATION_CALLBACK),
        )
        .with_fault(
            FaultConfig::new(FaultType::CallbackPanic, 0.05).with_filter(OPERATION_CALLBACK),
        )
        .run(|env| async move {
            let (root, agents) = group(&env, "faulty")?;
            let kernel = env.kernel(
                root,
                SchedulerConfig {
                    partitions_count: 4,
                    ..bounded(30)
                },
            )?;

            let report = kernel.run(&ActivationParams::empty()).await?;
            assert_eq!(report.ticks, 30);
            assert!(!kernel.is_running());
            assert_all_ended(&agents);
            Ok(env.trace().passes.len())
        });

    // Passes driven by the kernel itself are not recorded
    assert_eq!(result.expect("faults stay inside outcomes"), 0);
}

#[test]
fn test_dst_kernel_run_is_deterministic() {
    fn run_once(seed: u64) -> (u64, Vec<u64>) {
        Simulation::new(SimConfig::new(seed))
            .run(|env| async move {
                let (root, agents) = group(&env, "det")?;
                let kernel = env.kernel(root, bounded(25))?;
                kernel.run(&ActivationParams::empty()).await?;
                let sent: Vec<u64> = agents.iter().map(|agent| agent.sent_count()).collect();
                Ok((env.now_ms(), sent))
            })
            .expect("kernel run succeeds")
    }

    let first = run_once(9001);
    let second = run_once(9001);
    assert_eq!(first, second);
}

// =============================================================================
// Misuse
// =============================================================================

#[test]
fn test_dst_kernel_rejects_misuse() {
    let result = Simulation::new(SimConfig::new(3)).run(|env| async move {
        let (root, _agents) = group(&env, "misuse")?;
        let kernel = env.kernel(root, bounded(1))?;

        assert!(matches!(kernel.tick(), Err(Error::KernelNotRunning)));
        env.activate(&kernel, &ActivationParams::empty())?;
        assert!(matches!(
            kernel.activate(&ActivationParams::empty()),
            Err(Error::KernelAlreadyStarted)
        ));
        assert!(kernel.start(&ActivationParams::empty()).is_err());

        env.tick(&kernel)?;
        env.end(&kernel)?;
        assert!(matches!(kernel.end(), Err(Error::KernelNotRunning)));
        Ok(())
    });

    assert!(result.is_ok(), "{:?}", result.err());
}
