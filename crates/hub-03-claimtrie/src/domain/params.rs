//! Engine constants and the activation delay rule.

use shared_types::Height;

/// Supports younger than this many blocks count toward trending.
pub const TRENDING_BLOCKS: Height = 300;

/// Upper bound on the activation delay.
pub const MAX_ACTIVATION_DELAY: Height = 4032;

/// One block of delay per this many blocks since the last takeover.
pub const ACTIVATION_DELAY_FACTOR: Height = 32;

/// Tunables, fixed per network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineParams {
    pub trending_blocks: Height,
    pub max_activation_delay: Height,
    pub activation_delay_factor: Height,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            trending_blocks: TRENDING_BLOCKS,
            max_activation_delay: MAX_ACTIVATION_DELAY,
            activation_delay_factor: ACTIVATION_DELAY_FACTOR,
        }
    }
}

impl EngineParams {
    /// Height at which a claim submitted at `height` activates, given the
    /// name's last takeover. Names without a controlling claim activate
    /// immediately.
    pub fn activation_height(&self, height: Height, last_take_over: Option<Height>) -> Height {
        match last_take_over {
            None => height,
            Some(last) => {
                let delay = height.saturating_sub(last) / self.activation_delay_factor;
                height + delay.min(self.max_activation_delay)
            }
        }
    }

    /// Whether a support confirmed at `support_height` still counts toward
    /// trending at `height`.
    pub fn is_trending(&self, support_height: Height, height: Height) -> bool {
        support_height.saturating_add(self.trending_blocks) > height
    }
}
