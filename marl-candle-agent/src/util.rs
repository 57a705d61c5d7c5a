//! Utilities.
mod actor;
mod critic;
mod init;
use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::VarMap;
use log::trace;
use marl_core::error::MarlError;
use rand::Rng;
pub use actor::{Actor, ActorConfig};
pub use critic::{Critic, CriticConfig};
pub use init::{initialize, ParamInit};

/// Logit assigned to unavailable discrete actions.
///
/// A large finite negative value rather than `-inf`, so that a row with no
/// available action still yields a finite softmax.
pub const MASKED_LOGIT: f64 = -9_999_999.0;

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("dest");
    let dest = dest
        .data()
        .lock()
        .map_err(|_| anyhow!("Failed to lock the destination VarMap"))?;
    trace!("src");
    let src = src
        .data()
        .lock()
        .map_err(|_| anyhow!("Failed to lock the source VarMap"))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("Variable {} is missing in the source VarMap", k_dest))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + (1.0 - tau) * t_dest)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Interface for handling input dimensions.
pub trait InDim {
    /// Returns the input dimension.
    fn get_in_dim(&self) -> usize;

    /// Sets the input dimension.
    fn set_in_dim(&mut self, v: usize);
}

/// Fails with [`MarlError::ShapeMismatch`] unless `t` has exactly the `expected` shape.
pub fn check_dims(what: &str, t: &Tensor, expected: &[usize]) -> Result<()> {
    if t.dims() != expected {
        return Err(MarlError::shape(what, expected, t.dims()).into());
    }
    Ok(())
}

/// Returns one-hot agent identifiers of shape `(lead, n_agents, n_agents)`.
///
/// Row `i` of every block is the `i`-th unit vector.
pub fn agent_ids(lead: usize, n_agents: usize, device: &Device) -> Result<Tensor> {
    let eye = (0..n_agents * n_agents)
        .map(|k| if k / n_agents == k % n_agents { 1f32 } else { 0f32 })
        .collect::<Vec<_>>();
    Ok(Tensor::from_vec(eye, (n_agents, n_agents), device)?
        .unsqueeze(0)?
        .broadcast_as((lead, n_agents, n_agents))?
        .contiguous()?)
}

/// Returns `1.0` where `avail` is non-zero and `0.0` elsewhere.
pub fn avail_mask(avail: &Tensor) -> Result<Tensor> {
    Ok(avail.ne(0f32)?.to_dtype(DType::F32)?)
}

/// Replaces logits of unavailable actions with [`MASKED_LOGIT`].
///
/// `logits` and `avail` must have the same shape.
pub fn mask_logits(logits: &Tensor, avail: &Tensor) -> Result<Tensor> {
    check_dims("actions_avail vs logits", avail, logits.dims())?;
    let masked = logits.ones_like()?.affine(MASKED_LOGIT, 0.0)?;
    Ok(avail.ne(0f32)?.where_cond(logits, &masked)?)
}

/// Log density of a diagonal Gaussian, per action dimension.
///
/// Returns `-(x - mean)^2 / (2 var) - ln(2 pi) / 2 - log_std`, elementwise.
pub fn normal_log_density(x: &Tensor, mean: &Tensor, log_std: &Tensor) -> Result<Tensor> {
    check_dims("actions vs means", x, mean.dims())?;
    let var = (log_std * 2.0)?.exp()?;
    let sq = (x - mean)?.sqr()?;
    let c = -0.5 * (2.0 * std::f64::consts::PI).ln();
    Ok(((sq / (var * 2.0)?)?.neg()?.affine(1.0, c)? - log_std)?)
}

/// Normalizes each column over the batch dimension.
///
/// Uses the unbiased standard deviation with `1e-7` added to it. A single-row
/// batch is only centered, since its standard deviation is undefined.
pub fn normalize(x: &Tensor) -> Result<Tensor> {
    let b = x.dim(0)?;
    let centered = x.broadcast_sub(&x.mean_keepdim(0)?)?;
    if b < 2 {
        return Ok(centered);
    }
    let var = (centered.sqr()?.sum_keepdim(0)? / (b - 1) as f64)?;
    Ok(centered.broadcast_div(&(var.sqrt()? + 1e-7)?)?)
}

/// Draws `len` samples from the standard normal distribution.
///
/// Box-Muller transform on the given generator, so that results are
/// reproducible from a seed on every device.
pub fn standard_normal(rng: &mut impl Rng, len: usize) -> Vec<f32> {
    let mut samples = Vec::with_capacity(len + 1);
    while samples.len() < len {
        let u1 = rng.gen::<f32>().max(1e-10);
        let u2 = rng.gen::<f32>();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f32::consts::PI * u2;
        samples.push(r * theta.cos());
        samples.push(r * theta.sin());
    }
    samples.truncate(len);
    samples
}

/// Reduces the last axis of a per-agent value tensor `(lead, n, k)`.
///
/// State values (`k == 1`) are squeezed; action values are summed against
/// the one-hot `actions`.
pub fn select_values(values: &Tensor, actions: &Tensor) -> Result<Tensor> {
    match values.dim(D::Minus1)? {
        1 => Ok(values.squeeze(D::Minus1)?),
        _ => {
            check_dims("actions vs action values", actions, values.dims())?;
            Ok((values * actions)?.sum(D::Minus1)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::Init;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let t_src = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3,), &Device::Cpu)?;
        let t_dest = Tensor::from_slice(&[4.0f32, 5.0, 6.0], (3,), &Device::Cpu)?;
        let t = ((tau * &t_src)? + (1.0 - tau) * &t_dest)?;

        let varmap = |t: &Tensor| -> Result<VarMap> {
            let vm = VarMap::new();
            let init = Init::Randn {
                mean: 0.0,
                stdev: 1.0,
            };
            vm.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
            vm.data().lock().unwrap().get("var1").unwrap().set(t)?;
            Ok(vm)
        };
        let vm_src = varmap(&t_src)?;
        let vm_dest = varmap(&t_dest)?;
        track(&vm_dest, &vm_src, tau)?;

        let t_ = vm_dest
            .data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .as_tensor()
            .clone();
        assert!((t - t_)?.abs()?.sum(0)?.to_scalar::<f32>()? < 1e-6);

        // A missing variable in the source is an error, not a panic
        let vm_other = VarMap::new();
        vm_other.get((3,), "var2", Init::Const(0.), DType::F32, &Device::Cpu)?;
        assert!(track(&vm_dest, &vm_other, 1.0).is_err());

        Ok(())
    }

    #[test]
    fn test_mask_logits() -> Result<()> {
        let logits = Tensor::from_slice(&[0.5f32, 1.0, -2.0, 3.0], (1, 2, 2), &Device::Cpu)?;
        let avail = Tensor::from_slice(&[1f32, 0., 0., 1.], (1, 2, 2), &Device::Cpu)?;
        let masked = mask_logits(&logits, &avail)?.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(masked, vec![0.5, MASKED_LOGIT as f32, MASKED_LOGIT as f32, 3.0]);

        let avail = Tensor::ones((1, 2, 3), DType::F32, &Device::Cpu)?;
        assert!(mask_logits(&logits, &avail).is_err());
        Ok(())
    }

    #[test]
    fn test_normal_log_density() -> Result<()> {
        let x = Tensor::from_slice(&[0.0f32, 1.0], (1, 2), &Device::Cpu)?;
        let mean = Tensor::zeros((1, 2), DType::F32, &Device::Cpu)?;
        let log_std = Tensor::from_slice(&[0.0f32, 2f32.ln()], (1, 2), &Device::Cpu)?;
        let lp = normal_log_density(&x, &mean, &log_std)?.flatten_all()?.to_vec1::<f32>()?;

        let c = -0.5 * (2.0 * std::f32::consts::PI).ln();
        assert!((lp[0] - c).abs() < 1e-5);
        assert!((lp[1] - (-1.0 / 8.0 + c - 2f32.ln())).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_normalize() -> Result<()> {
        let x = Tensor::from_slice(&[1.0f32, 10.0, 2.0, 10.0, 3.0, 10.0], (3, 2), &Device::Cpu)?;
        let y = normalize(&x)?.to_vec2::<f32>()?;
        assert!((y[0][0] + 1.0).abs() < 1e-5);
        assert!(y[1][0].abs() < 1e-5);
        assert!((y[2][0] - 1.0).abs() < 1e-5);
        // A constant column is centered and stays finite
        assert!(y.iter().all(|row| row[1] == 0.0));

        let x = Tensor::from_slice(&[1.0f32, 2.0], (1, 2), &Device::Cpu)?;
        assert_eq!(normalize(&x)?.to_vec2::<f32>()?, vec![vec![0.0, 0.0]]);
        Ok(())
    }

    #[test]
    fn test_standard_normal() {
        let xs = standard_normal(&mut SmallRng::seed_from_u64(0), 20_001);
        assert_eq!(xs.len(), 20_001);
        let mean = xs.iter().sum::<f32>() / xs.len() as f32;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / xs.len() as f32;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
        assert_eq!(xs[..5], standard_normal(&mut SmallRng::seed_from_u64(0), 5)[..]);
    }

    #[test]
    fn test_agent_ids() -> Result<()> {
        let ids = agent_ids(2, 3, &Device::Cpu)?;
        assert_eq!(ids.dims(), &[2, 3, 3]);
        let v = ids.to_vec3::<f32>()?;
        assert_eq!(v[1][2], vec![0.0, 0.0, 1.0]);
        Ok(())
    }
}
