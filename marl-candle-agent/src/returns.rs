//! Returns and advantages.
use crate::util::{check_dims, normalize};
use anyhow::Result;
use candle_core::Tensor;
use marl_core::error::MarlError;

/// One-step bootstrapped returns, `(batch, n_agents)`.
///
/// `ret[t] = r[t] + gamma * next_values[t]`, where the bootstrap is dropped
/// for steps that both end an episode (`done`) and end the trajectory segment
/// (`last_step`). `next_values` is detached.
///
/// Rows are visited from the last to the first, matching how segments of
/// consecutive steps are laid out in a batch.
pub fn compute_returns(
    rewards: &Tensor,
    next_values: &Tensor,
    done: &[bool],
    last_step: &[bool],
    gamma: f64,
) -> Result<Tensor> {
    let (b, n) = rewards.dims2()?;
    check_dims("next_values vs rewards", next_values, &[b, n])?;
    if done.len() != b || last_step.len() != b {
        return Err(MarlError::shape("done/last_step", &[b], &[done.len().max(last_step.len())]).into());
    }

    let r = rewards.to_vec2::<f32>()?;
    let v = next_values.detach().to_vec2::<f32>()?;
    let gamma = gamma as f32;
    let mut returns = vec![0f32; b * n];

    for t in (0..b).rev() {
        let terminal = done[t] && last_step[t];
        for j in 0..n {
            let bootstrap = if terminal { 0.0 } else { v[t][j] };
            returns[t * n + j] = r[t][j] + gamma * bootstrap;
        }
    }

    Ok(Tensor::from_vec(returns, (b, n), rewards.device())?)
}

/// `values - baselines`, detached and optionally normalized per agent
/// over the batch.
pub fn advantages(values: &Tensor, baselines: &Tensor, normalize_advantages: bool) -> Result<Tensor> {
    check_dims("baselines vs values", baselines, values.dims())?;
    let adv = (values - baselines)?.detach();
    match normalize_advantages {
        true => normalize(&adv),
        false => Ok(adv),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_returns() -> Result<()> {
        let d = &Device::Cpu;
        let rewards = Tensor::from_slice(&[1f32, 2., 3., 4., 5., 6.], (3, 2), d)?;
        let next_values = Tensor::from_slice(&[10f32, 20., 30., 40., 50., 60.], (3, 2), d)?;
        let ret = compute_returns(
            &rewards,
            &next_values,
            &[false, true, true],
            &[false, false, true],
            0.5,
        )?;
        // done without last_step still bootstraps
        assert_eq!(
            ret.to_vec2::<f32>()?,
            vec![vec![6., 12.], vec![18., 24.], vec![5., 6.]]
        );

        assert!(compute_returns(&rewards, &next_values, &[false], &[false], 0.5).is_err());
        let err = compute_returns(&rewards, &rewards.narrow(1, 0, 1)?, &[false; 3], &[false; 3], 0.5)
            .unwrap_err();
        assert!(err.to_string().starts_with("Shape mismatch (next_values vs rewards)"));
        Ok(())
    }

    #[test]
    fn test_advantages() -> Result<()> {
        let d = &Device::Cpu;
        let values = Tensor::from_slice(&[1f32, 2., 3., 4.], (2, 2), d)?;
        let baselines = Tensor::from_slice(&[0f32, 0., 1., 1.], (2, 2), d)?;
        assert_eq!(
            advantages(&values, &baselines, false)?.to_vec2::<f32>()?,
            vec![vec![1., 2.], vec![2., 3.]]
        );
        let adv = advantages(&values, &baselines, true)?.to_vec2::<f32>()?;
        assert!((adv[0][0] + adv[1][0]).abs() < 1e-6);
        assert!(advantages(&values, &baselines.narrow(0, 0, 1)?, false).is_err());
        Ok(())
    }
}
