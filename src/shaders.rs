// ============================================================================
// shaders.rs — Life GPU
// Shader programs and the uniform blocks they read in bind group 1.
// ============================================================================

use bytemuck::{Pod, Zeroable};

use crate::controller::ActivityPos;
use crate::rules::AutomatonRule;

/// A complete program: the shared quad vertex stage plus one fragment stage.
#[derive(Clone, Copy, Debug)]
pub struct ShaderProgram {
    pub label: &'static str,
    pub source: &'static str,
    /// Size of the program's own uniform block, 0 when it has none.
    pub params_size: u64,
}

pub const SIMULATION: ShaderProgram = ShaderProgram {
    label: "life",
    source: concat!(include_str!("shaders/planar.wgsl"), include_str!("shaders/life.wgsl")),
    params_size: std::mem::size_of::<StepParams>() as u64,
};

pub const INITIAL_STATE: ShaderProgram = ShaderProgram {
    label: "life_init",
    source: concat!(include_str!("shaders/planar.wgsl"), include_str!("shaders/life_init.wgsl")),
    params_size: std::mem::size_of::<InitParams>() as u64,
};

pub const SCREEN: ShaderProgram = ShaderProgram {
    label: "screen",
    source: concat!(include_str!("shaders/planar.wgsl"), include_str!("shaders/screen.wgsl")),
    params_size: 0,
};

// ======================== Uniform Structs ========================

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StepParams {
    pub birth: u32,
    pub survive: u32,
    pub need_set_activity: u32,
    pub _pad0: u32,
    pub activity_pos: [f32; 2],
    pub _pad1: [f32; 2],
}

impl StepParams {
    pub fn new(rule: &AutomatonRule, activity: Option<ActivityPos>) -> Self {
        let (need_set_activity, activity_pos) = match activity {
            Some(pos) => (1, [pos.s(), pos.t()]),
            None => (0, [0.0; 2]),
        };
        Self {
            birth: rule.birth,
            survive: rule.survive,
            need_set_activity,
            activity_pos,
            ..Default::default()
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct InitParams {
    pub init_type: u32,
    pub seed: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}
