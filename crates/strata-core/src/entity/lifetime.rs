//! Optional entity lifetime

/// What happens when a life timer runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeExpiry {
    /// Report the death and leave removal to the listener
    Notify,
    /// Destroy the entity
    Destroy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifeTimer {
    life_time: f32,
    elapsed: f32,
    active: bool,
    expiry: LifeExpiry,
}

impl LifeTimer {
    /// Timer that destroys the entity after `life_time` seconds
    pub fn new(life_time: f32) -> Self {
        Self {
            life_time,
            elapsed: 0.0,
            active: true,
            expiry: LifeExpiry::Destroy,
        }
    }

    /// Timer that only reports expiry
    pub fn notifying(life_time: f32) -> Self {
        Self {
            expiry: LifeExpiry::Notify,
            ..Self::new(life_time)
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn remaining(&self) -> f32 {
        (self.life_time - self.elapsed).max(0.0)
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.active = true;
    }

    /// Advance by `dt`; fires once, then stays inactive until `reset`
    pub fn advance(&mut self, dt: f32) -> Option<LifeExpiry> {
        if !self.active {
            return None;
        }
        self.elapsed += dt;
        if self.elapsed >= self.life_time {
            self.active = false;
            Some(self.expiry)
        } else {
            None
        }
    }
}
