//! Counterfactual baselines of COMA.
use crate::{
    action::ActionSelector,
    actor_critic::ActorCriticModel,
    util::{agent_ids, check_dims},
};
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::ops::softmax;
use log::trace;

/// Exact expectation of the action values of each agent under its policy,
/// `sum_a softmax(logits)[a] * q[a]`, `(batch, n_agents)`.
pub(crate) fn discrete_baseline(q: &Tensor, masked_logits: &Tensor) -> Result<Tensor> {
    check_dims("logits vs action values", masked_logits, q.dims())?;
    let probs = softmax(masked_logits, D::Minus1)?;
    Ok((probs * q)?.sum(D::Minus1)?.detach())
}

/// Monte-Carlo estimate of the value of each agent when its own action is
/// redrawn from its Gaussian policy and the other agents keep theirs,
/// `(batch, n_agents)`.
///
/// `sample_size` actions are drawn per agent and batch row. For sample `s`
/// and evaluating agent `i`, the joint action is
/// `merged[s, b, i, j] = sampled[s, b, i]` if `i == j`, else `actions[b, j]`,
/// and all samples are valued in a single call.
pub(crate) fn monte_carlo_baseline<M: ActorCriticModel>(
    model: &M,
    selector: &mut ActionSelector,
    state: &Tensor,
    actions: &Tensor,
    means: &Tensor,
    log_stds: &Tensor,
    sample_size: usize,
) -> Result<Tensor> {
    let (b, n, a) = means.dims3()?;
    let s = sample_size;
    check_dims("actions vs means", actions, &[b, n, a])?;

    let sampled = {
        let means = means.detach().broadcast_as((s, b, n, a))?.contiguous()?;
        let log_stds = log_stds.detach().broadcast_as((s, b, n, a))?.contiguous()?;
        selector.gaussian(&means, &log_stds)?
    };
    let own = agent_ids(1, n, state.device())?.reshape((1, 1, n, n, 1))?;
    let others = (1.0 - &own)?;
    let sampled = sampled.unsqueeze(3)?.broadcast_as((s, b, n, n, a))?;
    let realized = actions
        .detach()
        .unsqueeze(0)?
        .unsqueeze(2)?
        .broadcast_as((s, b, n, n, a))?;
    let merged = (sampled.broadcast_mul(&own)? + realized.broadcast_mul(&others)?)?
        .reshape((s * b, n, n * a))?;
    trace!("Monte-Carlo baseline over {} samples", s);

    let values = model.value(state, &merged)?;
    Ok(values.reshape((s, b, n))?.mean(0)?.detach())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PolicyOutput;
    use anyhow::Result;
    use candle_core::{DType, Device};

    #[test]
    fn test_discrete_baseline_brute_force() -> Result<()> {
        let d = &Device::Cpu;
        let logits = Tensor::from_slice(&[0.1f32, 0.7, -0.3, 1.2, 0.0, 0.5], (1, 2, 3), d)?;
        let q = Tensor::from_slice(&[1f32, 2., 3., -1., 0., 4.], (1, 2, 3), d)?;
        let baseline = discrete_baseline(&q, &logits)?.to_vec2::<f32>()?;

        let logits = logits.to_vec3::<f32>()?;
        let q = q.to_vec3::<f32>()?;
        for i in 0..2 {
            let z = logits[0][i].iter().map(|l| l.exp()).sum::<f32>();
            let expected = (0..3)
                .map(|k| logits[0][i][k].exp() / z * q[0][i][k])
                .sum::<f32>();
            assert!((baseline[0][i] - expected).abs() < 1e-5);
        }
        Ok(())
    }

    /// Values a joint action `(lead, n, n * a)` by summing it, one value per agent.
    struct SumValue;

    impl ActorCriticModel for SumValue {
        fn n_agents(&self) -> usize {
            2
        }

        fn policy(&self, _obs: &Tensor) -> Result<PolicyOutput> {
            unimplemented!()
        }

        fn value(&self, _obs: &Tensor, act: &Tensor) -> Result<Tensor> {
            Ok(act.sum_keepdim(D::Minus1)?)
        }
    }

    #[test]
    fn test_monte_carlo_baseline_keeps_other_actions() -> Result<()> {
        let d = &Device::Cpu;
        let state = Tensor::zeros((1, 2, 1), DType::F32, d)?;
        let actions = Tensor::from_slice(&[10f32, 20.], (1, 2, 1), d)?;
        let means = Tensor::from_slice(&[1f32, 2.], (1, 2, 1), d)?;
        // Nearly deterministic samples
        let log_stds = (means.ones_like()? * -20.0)?;
        let mut selector = ActionSelector::new(0, None);
        let baseline =
            monte_carlo_baseline(&SumValue, &mut selector, &state, &actions, &means, &log_stds, 4)?
                .to_vec2::<f32>()?;
        assert!((baseline[0][0] - 21.0).abs() < 1e-3);
        assert!((baseline[0][1] - 12.0).abs() < 1e-3);
        Ok(())
    }
}
