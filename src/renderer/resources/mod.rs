/// "Resources" refers to middle-level objects that created by "Core" objects.
/// They are relatively intuitive and managed by the user.

pub mod mesh;
pub mod shader;
pub mod texture;
pub mod uniform;
pub mod vertex;
