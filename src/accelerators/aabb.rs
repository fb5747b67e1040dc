use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    /// Box containing nothing; growing it by any point yields that point.
    pub const EMPTY: AABB = AABB {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    #[inline]
    pub fn new(p0: Vec3, p1: Vec3) -> Self {
        AABB {
            min: p0.min(p1),
            max: p0.max(p1),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut aabb, point| {
            aabb.grow(point);
            aabb
        })
    }

    #[inline(always)]
    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn grow_bb_mut(&mut self, aabb: &Self) {
        *self = Self::combine(self, aabb)
    }

    #[inline(always)]
    pub fn combine(box0: &AABB, box1: &AABB) -> AABB {
        AABB {
            min: box0.min.min(box1.min),
            max: box0.max.max(box1.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && point.cmple(self.max).all()
    }

    pub fn contains(&self, other: &AABB) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    /// Axis with the largest extent. Ties go to the later axis only when it is
    /// strictly larger, so a cube picks x.
    pub fn largest_axis(&self) -> usize {
        let extent = self.extent();
        let mut axis = 0;

        if extent.y > extent[axis] {
            axis = 1;
        }
        if extent.z > extent[axis] {
            axis = 2;
        }

        axis
    }
}

impl Default for AABB {
    fn default() -> Self {
        Self::EMPTY
    }
}
