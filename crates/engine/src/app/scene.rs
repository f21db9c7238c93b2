use super::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

pub trait Scene {
    fn load(&mut self, world: &mut World);
    fn update(&mut self, fixed_dt_seconds: f32, world: &mut World) -> SceneCommand;
    /// Runs once per frame, after the perspective frame-start call.
    fn frame(&mut self, world: &World);
    fn unload(&mut self, world: &mut World);
    fn debug_title(&self, _world: &World) -> Option<String> {
        None
    }
}
