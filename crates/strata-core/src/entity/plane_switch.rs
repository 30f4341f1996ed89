//! Plane switching rules
//!
//! Decides when an entity should move between the inner and the outer plane:
//! - overlay doors, evaluated on the overlay's own feature table
//! - doors in the chunk's inner plane
//! - windows in the chunk's outer plane
//!
//! Rules only produce requests. The tracker commits a request once the
//! destination footprint is free.

use strata_terrain::{FeatureKind, PlaneId};

use crate::world::{Chunk, Overlay, OverlayId};

/// Where the destination footprint has to be checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchTarget {
    Chunk,
    Overlay(OverlayId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchRule {
    Door,
    Window,
    OverlayDoor,
    OverlayExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchRequest {
    pub plane: PlaneId,
    pub target: SwitchTarget,
    pub rule: SwitchRule,
}

/// What the rules look at for one evaluation
pub struct SwitchContext<'a> {
    pub chunk: &'a Chunk,
    pub tile_index: u32,
    pub tile_changed: bool,
    pub current: PlaneId,
    /// Overlay under the entity and the tile index inside it
    pub overlay: Option<(&'a Overlay, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OverlayTrack {
    id: OverlayId,
    tile_index: u32,
    feature: FeatureKind,
}

/// Features seen on the previous evaluation
#[derive(Debug, Clone, Default)]
pub struct PlaneSwitchState {
    base_feature: Option<FeatureKind>,
    overlay: Option<OverlayTrack>,
}

impl PlaneSwitchState {
    /// Forget cached features (chunk change, teleport)
    pub fn reset(&mut self) {
        self.base_feature = None;
        self.overlay = None;
    }

    pub fn evaluate(&mut self, ctx: &SwitchContext<'_>) -> Option<SwitchRequest> {
        let active = ctx.overlay.filter(|(overlay, _)| overlay.is_switchable());

        match (active, self.overlay) {
            (Some((overlay, tile_index)), previous) => {
                return self.evaluate_overlay(ctx, overlay, tile_index, previous);
            }
            (None, Some(previous)) => {
                self.overlay = None;
                let plane = ctx.chunk.find_real_plane(ctx.tile_index, PlaneId::INNER);
                log::debug!("[PLANE] left overlay {:?}, back to {}", previous.id, plane);
                return Some(SwitchRequest {
                    plane,
                    target: SwitchTarget::Chunk,
                    rule: SwitchRule::OverlayExit,
                });
            }
            (None, None) => {}
        }

        self.evaluate_chunk(ctx)
    }

    fn evaluate_overlay(
        &mut self,
        ctx: &SwitchContext<'_>,
        overlay: &Overlay,
        tile_index: u32,
        previous: Option<OverlayTrack>,
    ) -> Option<SwitchRequest> {
        let feature = overlay.feature_at(tile_index);
        let previous = previous.filter(|p| p.id == overlay.id());
        self.overlay = Some(OverlayTrack {
            id: overlay.id(),
            tile_index,
            feature,
        });

        let changed = previous.map_or(true, |p| p.tile_index != tile_index || p.feature != feature);
        if !changed {
            return None;
        }
        let last = previous.map_or(FeatureKind::None, |p| p.feature);
        let outside = ctx.chunk.find_real_plane(ctx.tile_index, PlaneId::INNER);

        let plane = if ctx.current == PlaneId::INNER
            && feature == FeatureKind::None
            && last != FeatureKind::Door
        {
            // Walked off the structure without using a door
            Some(outside)
        } else if feature == FeatureKind::Door {
            Some(if last == FeatureKind::None {
                PlaneId::INNER
            } else {
                outside
            })
        } else if last == FeatureKind::Door {
            Some(if feature != FeatureKind::None {
                PlaneId::INNER
            } else {
                outside
            })
        } else {
            None
        };

        plane.map(|plane| SwitchRequest {
            plane,
            target: SwitchTarget::Overlay(overlay.id()),
            rule: SwitchRule::OverlayDoor,
        })
    }

    fn evaluate_chunk(&mut self, ctx: &SwitchContext<'_>) -> Option<SwitchRequest> {
        let feature = ctx.chunk.feature_at(ctx.tile_index, PlaneId::INNER);
        let last = self.base_feature.replace(feature);
        let feature_changed = last != Some(feature);
        if !ctx.tile_changed && !feature_changed {
            return None;
        }

        if ctx.tile_changed && ctx.chunk.feature_at(ctx.tile_index, PlaneId::OUTER) == FeatureKind::Window
        {
            return Some(SwitchRequest {
                plane: ctx.current.opposite(),
                target: SwitchTarget::Chunk,
                rule: SwitchRule::Window,
            });
        }

        let plane = match ctx.current {
            PlaneId::OUTER => {
                // A door appearing or disappearing under the entity
                let door_flipped = feature_changed
                    && (feature == FeatureKind::Door || last == Some(FeatureKind::Door));
                door_flipped.then_some(PlaneId::INNER)
            }
            PlaneId::INNER if ctx.tile_changed => {
                let real = ctx.chunk.find_real_plane(ctx.tile_index, PlaneId::INNER);
                (real >= PlaneId::OUTER).then_some(PlaneId::OUTER)
            }
            _ => None,
        };

        plane.map(|plane| SwitchRequest {
            plane,
            target: SwitchTarget::Chunk,
            rule: SwitchRule::Door,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec2, Vec2};
    use strata_terrain::{FluidGrid, PlaneTable};

    fn chunk() -> Chunk {
        Chunk::new(IVec2::ZERO, 4, 4, PlaneTable::standard())
    }

    fn ctx<'a>(chunk: &'a Chunk, tile_index: u32, tile_changed: bool, current: PlaneId) -> SwitchContext<'a> {
        SwitchContext {
            chunk,
            tile_index,
            tile_changed,
            current,
            overlay: None,
        }
    }

    #[test]
    fn test_door_opening_under_stationary_entity() {
        let mut chunk = chunk();
        let mut state = PlaneSwitchState::default();
        assert_eq!(state.evaluate(&ctx(&chunk, 5, true, PlaneId::OUTER)), None);
        assert_eq!(state.evaluate(&ctx(&chunk, 5, false, PlaneId::OUTER)), None);

        chunk.set_feature(5, PlaneId::INNER, FeatureKind::Door);
        let request = state.evaluate(&ctx(&chunk, 5, false, PlaneId::OUTER)).unwrap();
        assert_eq!(request.plane, PlaneId::INNER);
        assert_eq!(request.rule, SwitchRule::Door);

        // No repeat while nothing changes
        assert_eq!(state.evaluate(&ctx(&chunk, 5, false, PlaneId::OUTER)), None);
    }

    #[test]
    fn test_door_removed_under_outer_entity() {
        let mut chunk = chunk();
        chunk.set_feature(5, PlaneId::INNER, FeatureKind::Door);
        let mut state = PlaneSwitchState::default();
        // Entity still outside, e.g. the first request was blocked
        state.evaluate(&ctx(&chunk, 5, true, PlaneId::OUTER));

        chunk.set_feature(5, PlaneId::INNER, FeatureKind::None);
        let request = state.evaluate(&ctx(&chunk, 5, false, PlaneId::OUTER)).unwrap();
        assert_eq!(request.plane, PlaneId::INNER);
        assert_eq!(request.rule, SwitchRule::Door);
        assert_eq!(state.evaluate(&ctx(&chunk, 5, false, PlaneId::OUTER)), None);
    }

    #[test]
    fn test_unrelated_feature_change_on_outer_is_ignored() {
        let mut chunk = chunk();
        let mut state = PlaneSwitchState::default();
        state.evaluate(&ctx(&chunk, 5, true, PlaneId::OUTER));

        chunk.set_feature(5, PlaneId::INNER, FeatureKind::Wall);
        assert_eq!(state.evaluate(&ctx(&chunk, 5, false, PlaneId::OUTER)), None);
    }

    #[test]
    fn test_leaving_structure_returns_outside() {
        let mut chunk = chunk();
        chunk.set_feature(5, PlaneId::BACK, FeatureKind::Wall);
        let mut state = PlaneSwitchState::default();

        // Backed by a wall: stay inside
        assert_eq!(state.evaluate(&ctx(&chunk, 5, true, PlaneId::INNER)), None);

        // Nothing behind tile 6
        let request = state.evaluate(&ctx(&chunk, 6, true, PlaneId::INNER)).unwrap();
        assert_eq!(request.plane, PlaneId::OUTER);
    }

    #[test]
    fn test_window_toggles_on_entry() {
        let mut chunk = chunk();
        chunk.set_feature(2, PlaneId::OUTER, FeatureKind::Window);
        let mut state = PlaneSwitchState::default();

        let request = state.evaluate(&ctx(&chunk, 2, true, PlaneId::OUTER)).unwrap();
        assert_eq!(request.plane, PlaneId::INNER);
        assert_eq!(request.rule, SwitchRule::Window);

        let request = state.evaluate(&ctx(&chunk, 2, true, PlaneId::INNER)).unwrap();
        assert_eq!(request.plane, PlaneId::OUTER);
    }

    #[test]
    fn test_overlay_door_and_exit() {
        let chunk = chunk();
        let mut overlay = Overlay::new(Vec2::ZERO, Vec2::ONE, FluidGrid::new(3, 1));
        assert!(overlay.set_feature_rows(&[".Di"]));
        let mut state = PlaneSwitchState::default();

        let mut c = ctx(&chunk, 0, true, PlaneId::OUTER);
        c.overlay = Some((&overlay, 0));
        assert_eq!(state.evaluate(&c), None);

        // Onto the door from open ground
        c.overlay = Some((&overlay, 1));
        let request = state.evaluate(&c).unwrap();
        assert_eq!(request.plane, PlaneId::INNER);
        assert_eq!(request.target, SwitchTarget::Overlay(overlay.id()));

        // Through the door into the interior
        let mut c = ctx(&chunk, 0, true, PlaneId::INNER);
        c.overlay = Some((&overlay, 2));
        assert_eq!(state.evaluate(&c).map(|r| r.plane), Some(PlaneId::INNER));

        // Off the overlay entirely
        let c = ctx(&chunk, 0, true, PlaneId::INNER);
        let request = state.evaluate(&c).unwrap();
        assert_eq!(request.rule, SwitchRule::OverlayExit);
        assert_eq!(request.plane, PlaneId::OUTER);
    }

    #[test]
    fn test_non_switchable_overlay_is_ignored() {
        let chunk = chunk();
        let mut overlay = Overlay::new(Vec2::ZERO, Vec2::ONE, FluidGrid::new(2, 1));
        assert!(overlay.set_feature_rows(&["D."]));
        overlay.set_switchable(false);
        let mut state = PlaneSwitchState::default();

        let mut c = ctx(&chunk, 0, true, PlaneId::OUTER);
        c.overlay = Some((&overlay, 0));
        assert_eq!(state.evaluate(&c), None);
    }
}
