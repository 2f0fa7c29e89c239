//! 尖端与碰撞球的位置修正

use glam::Vec3;

/// 多球修正的最大轮数
const MAX_COLLISION_PASSES: usize = 4;

/// 交线圆采样数
const CIRCLE_SAMPLES: usize = 32;

/// 穿透判定容差
const COLLISION_EPSILON: f32 = 1e-4;

/// 把 `point` 投影到以 `head` 为中心、半径 `length` 的球面上
///
/// 重合时沿 `fallback` 方向放置。
#[inline]
pub fn project_to_length(point: Vec3, head: Vec3, length: f32, fallback: Vec3) -> Vec3 {
    let dir = (point - head).try_normalize().unwrap_or(fallback);
    head + dir * length
}

/// 尖端与一个碰撞球的修正
///
/// 1. 尖端在球内时沿分离方向推到球面，再投影回骨骼长度球面
/// 2. 投影后仍在球内时，取两球交线圆上离尖端最近的点
/// 3. 两球没有交线圆时，取长度球上离碰撞球心最远的点
///
/// 返回修正后的尖端位置；未发生碰撞时原样返回。
pub fn resolve_sphere(tip: Vec3, head: Vec3, length: f32, center: Vec3, radius: f32) -> Vec3 {
    let offset = tip - center;
    let dist = offset.length();
    if dist >= radius {
        return tip;
    }

    let push_dir = offset.try_normalize().unwrap_or_else(|| (tip - head).normalize_or_zero());
    let pushed = center + push_dir * radius;
    let rest_dir = (tip - head).try_normalize().unwrap_or(Vec3::Z);
    let projected = project_to_length(pushed, head, length, rest_dir);
    if projected.distance(center) >= radius - 1e-5 {
        return projected;
    }

    match intersection_circle(head, length, center, radius) {
        Some((circle_center, n, h)) => {
            let rel = tip - circle_center;
            let planar = rel - n * rel.dot(n);
            let dir = planar.try_normalize().unwrap_or_else(|| n.any_orthonormal_vector());
            circle_center + dir * h
        }
        None => {
            // 无法同时满足两球约束，远离球心
            let away = (head - center).try_normalize().unwrap_or(rest_dir);
            head + away * length
        }
    }
}

/// 长度球与碰撞球的交线圆：(圆心, 法向, 半径)
fn intersection_circle(head: Vec3, length: f32, center: Vec3, radius: f32) -> Option<(Vec3, Vec3, f32)> {
    let axis = center - head;
    let d = axis.length();
    if d < 1e-6 || d + length <= radius || d >= length + radius || length >= d + radius {
        return None;
    }
    let n = axis / d;
    // 圆心距 head 为 a
    let a = (length * length - radius * radius + d * d) / (2.0 * d);
    let h = (length * length - a * a).max(0.0).sqrt();
    Some((head + n * a, n, h))
}

/// 到一组碰撞球表面的最小带符号距离（负值为穿透）
pub fn clearance(point: Vec3, spheres: &[(Vec3, f32)]) -> f32 {
    spheres
        .iter()
        .map(|&(c, r)| point.distance(c) - r)
        .fold(f32::INFINITY, f32::min)
}

/// 尖端与一组碰撞球的修正
///
/// 先逐球修正，最多 MAX_COLLISION_PASSES 轮，直到一轮内没有球移动尖端。
/// 相互重叠的球可能把尖端来回推，此时在各交线圆上采样，
/// 取不穿透任何球且离原尖端最近的点；全部穿透时取穿透最浅的点。
/// 返回值始终在长度球面上。
pub fn resolve_spheres(tip: Vec3, head: Vec3, length: f32, spheres: &[(Vec3, f32)]) -> Vec3 {
    let mut point = tip;
    for _ in 0..MAX_COLLISION_PASSES {
        let mut moved = false;
        for &(center, radius) in spheres {
            let next = resolve_sphere(point, head, length, center, radius);
            if next != point {
                point = next;
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }

    let mut best = point;
    let mut best_clearance = clearance(point, spheres);
    if best_clearance >= -COLLISION_EPSILON {
        return best;
    }

    let mut best_distance = f32::INFINITY;
    for &(center, radius) in spheres {
        let Some((circle_center, n, h)) = intersection_circle(head, length, center, radius) else {
            continue;
        };
        let u = n.any_orthonormal_vector();
        let v = n.cross(u);
        for k in 0..CIRCLE_SAMPLES {
            let angle = k as f32 * std::f32::consts::TAU / CIRCLE_SAMPLES as f32;
            let candidate = circle_center + (u * angle.cos() + v * angle.sin()) * h;
            let c = clearance(candidate, spheres);
            let distance = candidate.distance(tip);
            let valid = c >= -COLLISION_EPSILON;
            let best_valid = best_clearance >= -COLLISION_EPSILON;
            let better = match (valid, best_valid) {
                (true, true) => distance < best_distance,
                (true, false) => true,
                (false, true) => false,
                (false, false) => c > best_clearance,
            };
            if better {
                best = candidate;
                best_clearance = c;
                best_distance = distance;
            }
        }
    }
    best
}
