#![allow(dead_code)]
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use marl_candle_agent::{
    coma::ComaConfig,
    ippo::IppoConfig,
    mlp::{Mlp, MlpConfig, PolicyMlp, PolicyMlpConfig},
    util::{ActorConfig, CriticConfig},
    MarlBatch,
};
use marl_core::ActionSpace;
use rand::{rngs::SmallRng, Rng, SeedableRng};

pub const N_AGENTS: usize = 3;
pub const OBS_DIM: usize = 4;
pub const ACT_DIM: usize = 5;
pub const GAMMA: f64 = 0.99;

pub type ComaMlp = marl_candle_agent::coma::Coma<PolicyMlp, Mlp>;
pub type IppoMlp = marl_candle_agent::ippo::Ippo<PolicyMlp, Mlp>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn coma_config(action_space: ActionSpace) -> ComaConfig<PolicyMlp, Mlp> {
    let (n, o, a) = (N_AGENTS, OBS_DIM, ACT_DIM);
    let value_out = match action_space {
        ActionSpace::Discrete => a,
        ActionSpace::Continuous => 1,
    };
    ComaConfig::default()
        .dims(n, o, a)
        .action_space(action_space)
        .discount_factor(GAMMA)
        .actor_config(ActorConfig::default().policy_config(PolicyMlpConfig::new(
            o + n,
            vec![16],
            a,
            action_space,
        )))
        .critic_config(CriticConfig::default().value_config(MlpConfig::new(
            (n + 1) * o + n + n * a,
            vec![16],
            value_out,
            false,
        )))
        .device(Device::Cpu)
}

pub fn ippo_config(action_space: ActionSpace) -> IppoConfig<PolicyMlp, Mlp> {
    let (n, o, a) = (N_AGENTS, OBS_DIM, ACT_DIM);
    IppoConfig::default()
        .dims(n, o, a)
        .action_space(action_space)
        .discount_factor(GAMMA)
        .actor_config(ActorConfig::default().policy_config(PolicyMlpConfig::new(
            o + n,
            vec![16],
            a,
            action_space,
        )))
        .critic_config(CriticConfig::default().value_config(MlpConfig::new(
            o + n,
            vec![16],
            1,
            false,
        )))
        .device(Device::Cpu)
}

/// Four consecutive steps ending an episode, every action available.
pub fn batch(action_space: ActionSpace, seed: u64) -> Result<MarlBatch> {
    let (b, n, o, a) = (4, N_AGENTS, OBS_DIM, ACT_DIM);
    let d = &Device::Cpu;
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut uniform = |len: usize| (0..len).map(|_| rng.gen_range(-1f32..1f32)).collect::<Vec<_>>();

    let state = Tensor::from_vec(uniform(b * n * o), (b, n, o), d)?;
    let next_state = Tensor::from_vec(uniform(b * n * o), (b, n, o), d)?;
    let rewards = Tensor::from_vec(uniform(b * n), (b, n), d)?;
    let actions = match action_space {
        ActionSpace::Discrete => {
            let one_hot = (0..b * n * a)
                .map(|k| match (k / a) % a == k % a {
                    true => 1f32,
                    false => 0f32,
                })
                .collect::<Vec<_>>();
            Tensor::from_vec(one_hot, (b, n, a), d)?
        }
        ActionSpace::Continuous => Tensor::from_vec(uniform(b * n * a), (b, n, a), d)?,
    };
    let actions_avail = Tensor::ones((b, n, a), DType::F32, d)?;
    let done = vec![false, false, false, true];

    MarlBatch::new(
        state,
        actions,
        rewards,
        next_state,
        done.clone(),
        done,
        actions_avail,
    )
}

/// Per-agent sum of `log_softmax(logits) * actions`, `(batch, n_agents)`.
pub fn discrete_log_prob(logits: &Tensor, actions: &Tensor) -> Result<Tensor> {
    let log_probs = candle_nn::ops::log_softmax(logits, candle_core::D::Minus1)?;
    Ok((log_probs * actions)?.sum(candle_core::D::Minus1)?)
}

/// Returns with the bootstrap dropped on the last row.
pub fn expected_returns(rewards: &Tensor, next_values: &Tensor) -> Result<Vec<Vec<f32>>> {
    let r = rewards.to_vec2::<f32>()?;
    let v = next_values.to_vec2::<f32>()?;
    let last = r.len() - 1;
    Ok(r.iter()
        .zip(v.iter())
        .enumerate()
        .map(|(t, (r, v))| match t == last {
            true => r.clone(),
            false => r.iter().zip(v.iter()).map(|(r, v)| r + GAMMA as f32 * v).collect(),
        })
        .collect())
}

pub fn assert_close(a: f32, b: f32, tol: f32) {
    assert!((a - b).abs() < tol, "{} != {}", a, b);
}
