mod common;
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use common::*;
use marl_candle_agent::{
    ippo::IppoConfig,
    mlp::{Mlp, PolicyMlp},
    ppo::PpoConfig,
    util::{agent_ids, normal_log_density},
    value::ValueEstimator,
    MarlBatch,
};
use marl_core::{error::MarlError, ActionSpace, Configurable, Status};
use tempdir::TempDir;

/// Attaches log-probabilities of the current policy as `old_log_prob`, so
/// that every probability ratio is one.
fn on_policy(ippo: &IppoMlp, batch: MarlBatch, action_space: ActionSpace) -> Result<MarlBatch> {
    let out = ippo.policy(batch.state())?;
    let log_prob = match action_space {
        ActionSpace::Discrete => discrete_log_prob(out.logits()?, batch.actions())?,
        ActionSpace::Continuous => {
            let (means, log_stds) = out.gaussian_params()?;
            normal_log_density(batch.actions(), &means, &log_stds)?.sum(D::Minus1)?
        }
    };
    batch.with_old_log_prob(log_prob.detach())
}

fn check_on_policy_losses(action_space: ActionSpace) -> Result<()> {
    let config = ippo_config(action_space);
    let mut ippo = IppoMlp::build(config.clone())?;
    let mut replica = IppoMlp::build(config)?;
    let batch = on_policy(&ippo, batch(action_space, 0)?, action_space)?;
    let losses = ippo.get_loss(&batch)?;

    // The replica draws the same next actions from the same generator state
    let next = replica.get_actions(
        batch.next_state(),
        Status::Train,
        true,
        batch.actions_avail(),
        true,
    )?;
    let next_values = replica
        .value(batch.next_state(), &next.restored_actions)?
        .squeeze(D::Minus1)?;
    let values = replica
        .value(batch.state(), batch.actions())?
        .squeeze(D::Minus1)?;
    let returns = Tensor::from_vec(
        expected_returns(batch.rewards(), &next_values)?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>(),
        values.dims(),
        &Device::Cpu,
    )?;
    let adv = (returns - values)?;

    // With unit ratios the surrogate is the plain advantage
    let policy_loss = adv.mean_all()?.neg()?.to_scalar::<f32>()?;
    let value_loss = adv.sqr()?.mean_all()?.to_scalar::<f32>()?;
    assert_close(losses.policy_loss.to_scalar::<f32>()?, policy_loss, 1e-4);
    assert_close(losses.value_loss.to_scalar::<f32>()?, value_loss, 1e-4);
    Ok(())
}

#[test]
fn test_on_policy_losses_discrete() -> Result<()> {
    init_logger();
    check_on_policy_losses(ActionSpace::Discrete)
}

#[test]
fn test_on_policy_losses_continuous() -> Result<()> {
    check_on_policy_losses(ActionSpace::Continuous)
}

#[test]
fn test_clipped_value_loss_is_not_smaller() -> Result<()> {
    let batch = batch(ActionSpace::Discrete, 1)?;
    let mut plain = IppoMlp::build(ippo_config(ActionSpace::Discrete))?;
    let mut clipped = IppoMlp::build(
        ippo_config(ActionSpace::Discrete).ppo_config(PpoConfig::default().clip_value(true)),
    )?;
    let plain = plain.get_loss(&batch)?.value_loss.to_scalar::<f32>()?;
    let clipped = clipped.get_loss(&batch)?.value_loss.to_scalar::<f32>()?;
    assert!(clipped >= plain - 1e-6);
    Ok(())
}

#[test]
fn test_decentralized_agent_permutation() -> Result<()> {
    let ippo = IppoMlp::build(ippo_config(ActionSpace::Discrete))?;
    let batch = batch(ActionSpace::Discrete, 2)?;
    let (b, n, d) = (4, N_AGENTS, &Device::Cpu);
    let state = batch.state();
    let values = ippo.value(state, batch.actions())?;

    // Critic rows are each agent's observation followed by its identifier
    let rows = |obs: &Tensor, ids: &Tensor| -> Result<Tensor> {
        Ok(Tensor::cat(&[obs, ids], D::Minus1)?.reshape((b * n, OBS_DIM + n))?)
    };
    let (inputs, _) = ippo.model().estimator().assemble(state, batch.actions())?;
    assert_eq!(
        inputs.to_vec2::<f32>()?,
        rows(state, &agent_ids(b, n, d)?)?.to_vec2::<f32>()?
    );

    // Swapping agents 0 and 2 in the observations and the identifiers swaps
    // their values
    let perm = Tensor::new(&[2u32, 1, 0], d)?;
    let (permuted, _) = ippo.model().critic().forward(
        &rows(
            &state.index_select(&perm, 1)?,
            &agent_ids(b, n, d)?.index_select(&perm, 1)?,
        )?,
        None,
    )?;
    let expected = values.index_select(&perm, 1)?;
    for (x, y) in permuted
        .flatten_all()?
        .to_vec1::<f32>()?
        .iter()
        .zip(expected.flatten_all()?.to_vec1::<f32>()?.iter())
    {
        assert_close(*x, *y, 1e-5);
    }

    // Swapping the observations alone changes them, identifiers matter
    let swapped = ippo.value(&state.index_select(&perm, 1)?, batch.actions())?;
    assert_ne!(
        swapped.flatten_all()?.to_vec1::<f32>()?,
        expected.flatten_all()?.to_vec1::<f32>()?
    );

    // Values ignore actions
    let other = ippo.value(batch.state(), &batch.actions().zeros_like()?)?;
    assert_eq!(
        other.flatten_all()?.to_vec1::<f32>()?,
        values.flatten_all()?.to_vec1::<f32>()?
    );
    Ok(())
}

#[test]
fn test_training_steps() -> Result<()> {
    let mut ippo = IppoMlp::build(ippo_config(ActionSpace::Continuous).target(false))?;
    assert!(ippo.target_model().is_none());
    let batch = batch(ActionSpace::Continuous, 3)?;
    let before = ippo.get_loss(&batch)?;
    ippo.backward_step(&before)?;
    ippo.sync_target()?;
    ippo.soft_update_target()?;
    let after = ippo.get_loss(&batch)?;
    assert_ne!(
        before.value_loss.to_scalar::<f32>()?,
        after.value_loss.to_scalar::<f32>()?
    );
    Ok(())
}

#[test]
fn test_action_space_mismatch() -> Result<()> {
    let mut config = ippo_config(ActionSpace::Discrete);
    config.actor_config = ippo_config(ActionSpace::Continuous).actor_config;
    let mut ippo = IppoMlp::build(config)?;
    let err = ippo.get_loss(&batch(ActionSpace::Discrete, 4)?).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MarlError>(),
        Some(MarlError::ActionSpaceMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_invalid_clip_epsilon() {
    let config =
        ippo_config(ActionSpace::Discrete).ppo_config(PpoConfig::default().clip_epsilon(-0.1));
    let err = IppoMlp::build(config).err().unwrap();
    assert!(matches!(
        err.downcast_ref::<MarlError>(),
        Some(MarlError::InvalidConfig(_))
    ));
}

#[test]
fn test_config_and_params_round_trip() -> Result<()> {
    let dir = TempDir::new("ippo")?;
    let path = dir.path().join("ippo.yaml");
    let config = ippo_config(ActionSpace::Continuous)
        .ppo_config(PpoConfig::default().clip_epsilon(0.1).clip_value(true))
        .seed(5);
    config.save(&path)?;
    let loaded = IppoConfig::<PolicyMlp, Mlp>::load(&path)?;
    assert_eq!(serde_yaml::to_string(&config)?, serde_yaml::to_string(&loaded)?);
    assert_eq!(loaded.ppo_config, config.ppo_config);

    let ippo = IppoMlp::build_from_path(&path)?;
    ippo.save_params(dir.path().join("params"))?;
    let mut other = IppoMlp::build(loaded.seed(6))?;
    other.load_params(dir.path().join("params"))?;

    let batch = batch(ActionSpace::Continuous, 5)?;
    let values = |ippo: &IppoMlp| -> Result<Vec<f32>> {
        Ok(ippo
            .value(batch.state(), batch.actions())?
            .flatten_all()?
            .to_vec1::<f32>()?)
    };
    assert_eq!(values(&ippo)?, values(&other)?);
    Ok(())
}
