use compositor::{
    AnimatedFloat, CubeTransform, DotMaskStyle, FieldSource, LatestField, Presentation,
    ScanlineMode, ShaderOptions, ViewState,
};
use winit::keyboard::{Key, NamedKey};

/// Frames for one full turn of the cube.
const CUBE_TURN_FRAMES: u32 = 90;
const CUBE_TILT_DEGREES: f32 = 12.0;
const WHITE_FADE_FRAMES: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    TogglePause,
    TogglePower,
    ToggleBloom,
    ToggleCube,
    CycleDotMask,
    CycleScanlines,
    ToggleWhite,
    Quit,
}

pub fn action_for_key(key: &Key) -> Option<Action> {
    match key {
        Key::Named(NamedKey::Space) => Some(Action::TogglePause),
        Key::Named(NamedKey::Escape) => Some(Action::Quit),
        Key::Character(value) => match value.to_ascii_lowercase().as_str() {
            " " => Some(Action::TogglePause),
            "p" => Some(Action::TogglePower),
            "b" => Some(Action::ToggleBloom),
            "c" => Some(Action::ToggleCube),
            "m" => Some(Action::CycleDotMask),
            "s" => Some(Action::CycleScanlines),
            "w" => Some(Action::ToggleWhite),
            "q" => Some(Action::Quit),
            _ => None,
        },
        _ => None,
    }
}

/// Demo state the keyboard acts on.
pub struct Controls {
    pub options: ShaderOptions,
    paused: bool,
    cube: bool,
    angle: AnimatedFloat,
    white: AnimatedFloat,
}

impl Controls {
    pub fn new(options: ShaderOptions) -> Self {
        Self {
            options,
            paused: false,
            cube: false,
            angle: AnimatedFloat::new(0.0),
            white: AnimatedFloat::new(0.0),
        }
    }

    /// Applies `action`; returns `false` when the viewer should quit.
    pub fn apply(&mut self, action: Action, source: &LatestField) -> bool {
        match action {
            Action::TogglePause => self.paused = !self.paused,
            Action::TogglePower => source.set_powered_off(!source.is_powered_off()),
            Action::ToggleBloom => self.options.bloom = !self.options.bloom,
            Action::ToggleCube => self.toggle_cube(),
            Action::CycleDotMask => {
                let styles = DotMaskStyle::ALL;
                let index = styles
                    .iter()
                    .position(|style| *style == self.options.dot_mask)
                    .unwrap_or(0);
                self.options.dot_mask = styles[(index + 1) % styles.len()];
            }
            Action::CycleScanlines => {
                self.options.scanlines = match self.options.scanlines {
                    ScanlineMode::Off => ScanlineMode::Embedded,
                    ScanlineMode::Embedded => ScanlineMode::Effective,
                    ScanlineMode::Effective => ScanlineMode::Off,
                };
            }
            Action::ToggleWhite => {
                let target = if self.white.target() > 0.0 { 0.0 } else { 1.0 };
                self.white.animate_to(target, WHITE_FADE_FRAMES);
            }
            Action::Quit => return false,
        }
        tracing::debug!(?action, "applied key binding");
        true
    }

    fn toggle_cube(&mut self) {
        if self.cube && !self.angle.animates() {
            self.cube = false;
            self.angle.set(0.0);
        } else {
            self.cube = true;
            let target = self.angle.target() + 360.0;
            self.angle.animate_to(target, CUBE_TURN_FRAMES);
        }
    }

    /// Advances animations by one frame.
    pub fn step(&mut self) {
        if !self.paused {
            self.angle.step();
            self.white.step();
        }
    }

    pub fn view(&self) -> ViewState {
        let presentation = if self.cube {
            let animating = self.angle.animates();
            Presentation::Transition {
                transform: CubeTransform {
                    angle_x: if animating { CUBE_TILT_DEGREES } else { 0.0 },
                    angle_y: self.angle.current() % 360.0,
                    ..CubeTransform::default()
                },
                animating,
            }
        } else {
            Presentation::Flat
        };
        ViewState {
            paused: self.paused,
            presentation,
            white: self.white.current(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(
            action_for_key(&Key::Named(NamedKey::Space)),
            Some(Action::TogglePause)
        );
        assert_eq!(
            action_for_key(&Key::Character("B".into())),
            Some(Action::ToggleBloom)
        );
        assert_eq!(action_for_key(&Key::Character("z".into())), None);
    }

    #[test]
    fn cube_turns_once_then_rests_on_the_front_face() {
        let source = LatestField::new();
        let mut controls = Controls::new(ShaderOptions::tft());
        assert!(controls.apply(Action::ToggleCube, &source));

        assert!(matches!(
            controls.view().presentation,
            Presentation::Transition { animating: true, .. }
        ));
        for _ in 0..CUBE_TURN_FRAMES {
            controls.step();
        }
        match controls.view().presentation {
            Presentation::Transition {
                transform,
                animating,
            } => {
                assert!(!animating);
                assert_eq!(transform.angle_y, 0.0);
            }
            other => panic!("unexpected presentation {other:?}"),
        }

        controls.apply(Action::ToggleCube, &source);
        assert_eq!(controls.view().presentation, Presentation::Flat);
    }

    #[test]
    fn paused_cube_does_not_turn() {
        let source = LatestField::new();
        let mut controls = Controls::new(ShaderOptions::tft());
        controls.apply(Action::ToggleCube, &source);
        controls.apply(Action::TogglePause, &source);
        controls.step();
        assert!(controls.view().paused);
        match controls.view().presentation {
            Presentation::Transition { transform, .. } => assert_eq!(transform.angle_y, 0.0),
            other => panic!("unexpected presentation {other:?}"),
        }
    }

    #[test]
    fn white_fades_in_and_back_out() {
        let source = LatestField::new();
        let mut controls = Controls::new(ShaderOptions::tft());
        controls.apply(Action::ToggleWhite, &source);
        assert_eq!(controls.view().white, 0.0);
        for _ in 0..WHITE_FADE_FRAMES / 2 {
            controls.step();
        }
        let halfway = controls.view().white;
        assert!(halfway > 0.4 && halfway < 0.6, "halfway at {halfway}");
        for _ in 0..WHITE_FADE_FRAMES {
            controls.step();
        }
        assert_eq!(controls.view().white, 1.0);

        controls.apply(Action::ToggleWhite, &source);
        for _ in 0..=WHITE_FADE_FRAMES {
            controls.step();
        }
        assert_eq!(controls.view().white, 0.0);
    }

    #[test]
    fn toggles_power_bloom_and_galleries() {
        let source = LatestField::new();
        let mut controls = Controls::new(ShaderOptions::tft());
        controls.apply(Action::TogglePower, &source);
        assert!(source.is_powered_off());
        controls.apply(Action::ToggleBloom, &source);
        assert!(controls.options.bloom);
        controls.apply(Action::CycleDotMask, &source);
        assert_eq!(controls.options.dot_mask, DotMaskStyle::ApertureGrille3);
        controls.apply(Action::CycleScanlines, &source);
        assert_eq!(controls.options.scanlines, ScanlineMode::Embedded);
        assert!(!controls.apply(Action::Quit, &source));
    }
}
