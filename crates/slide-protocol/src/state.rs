//! 机械臂状态快照
//!
//! 由机器人驱动在每个控制周期产生，控制循环只读消费，下一周期即被替换。

use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use std::time::Instant;

/// 关节数量（7 自由度机械臂）
pub const JOINT_COUNT: usize = 7;

/// 末端位姿
///
/// 姿态使用单位四元数，分量顺序 `[x, y, z, w]`。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EndEffectorPose {
    /// 位置（米）
    pub position: [f64; 3],
    /// 姿态四元数 `[x, y, z, w]`
    pub orientation: [f64; 4],
}

impl EndEffectorPose {
    pub const fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// 位置在原点、姿态为单位旋转
    pub const fn identity() -> Self {
        Self {
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// 从列主序 4×4 齐次变换构建
    ///
    /// 平移取第 4 列（索引 12..15），旋转块转换为单位四元数。
    pub fn from_transform(o_t_ee: &[f64; 16]) -> Self {
        let m = o_t_ee;
        // Matrix3::new 按行传参，列主序输入需要转置读取
        let rotation = Matrix3::new(m[0], m[4], m[8], m[1], m[5], m[9], m[2], m[6], m[10]);
        let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
        let c = q.quaternion().coords;

        Self {
            position: [m[12], m[13], m[14]],
            orientation: [c[0], c[1], c[2], c[3]],
        }
    }

    /// 转换为列主序 4×4 齐次变换
    pub fn to_transform(&self) -> [f64; 16] {
        let [x, y, z, w] = self.orientation;
        let rotation =
            UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)).to_rotation_matrix();
        let r = rotation.matrix();
        let mut t = [0.0; 16];
        for col in 0..3 {
            for row in 0..3 {
                t[col * 4 + row] = r[(row, col)];
            }
        }
        t[12..15].copy_from_slice(&self.position);
        t[15] = 1.0;
        t
    }

    /// 相对另一位姿的位移（只比较位置）
    pub fn displacement_from(&self, origin: &EndEffectorPose) -> [f64; 3] {
        [
            self.position[0] - origin.position[0],
            self.position[1] - origin.position[1],
            self.position[2] - origin.position[2],
        ]
    }
}

impl Default for EndEffectorPose {
    fn default() -> Self {
        Self::identity()
    }
}

/// 机械臂状态快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotState {
    /// 关节位置（弧度）
    pub joint_positions: [f64; JOINT_COUNT],
    /// 关节速度（弧度/秒）
    pub joint_velocities: [f64; JOINT_COUNT],
    /// 末端位姿
    pub pose: EndEffectorPose,
    /// 外力估计 `[Fx, Fy, Fz, Tx, Ty, Tz]`（N / N·m）
    pub wrench: [f64; 6],
    /// 采集时刻
    pub captured_at: Instant,
}

impl RobotState {
    /// 静止状态（零速度、零外力）
    pub fn at_rest(
        joint_positions: [f64; JOINT_COUNT],
        pose: EndEffectorPose,
        captured_at: Instant,
    ) -> Self {
        Self {
            joint_positions,
            joint_velocities: [0.0; JOINT_COUNT],
            pose,
            wrench: [0.0; 6],
            captured_at,
        }
    }

    /// 外力模（只取力分量）
    #[inline]
    pub fn force_magnitude(&self) -> f64 {
        Vector3::new(self.wrench[0], self.wrench[1], self.wrench[2]).norm()
    }

    /// 快照年龄
    #[inline]
    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.captured_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_force_magnitude_ignores_torque() {
        let mut state = RobotState::at_rest([0.0; 7], EndEffectorPose::identity(), Instant::now());
        state.wrench = [3.0, 4.0, 0.0, 100.0, 100.0, 100.0];
        assert_relative_eq!(state.force_magnitude(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pose_from_identity_transform() {
        let mut t = [0.0; 16];
        t[0] = 1.0;
        t[5] = 1.0;
        t[10] = 1.0;
        t[15] = 1.0;
        t[12] = 0.3;
        t[13] = -0.1;
        t[14] = 0.5;

        let pose = EndEffectorPose::from_transform(&t);
        assert_eq!(pose.position, [0.3, -0.1, 0.5]);
        assert_relative_eq!(pose.orientation[3].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pose_from_rotation_about_z() {
        // 绕 z 轴 90°，列主序
        let t = [
            0.0, 1.0, 0.0, 0.0, // 第 1 列
            -1.0, 0.0, 0.0, 0.0, // 第 2 列
            0.0, 0.0, 1.0, 0.0, // 第 3 列
            0.0, 0.0, 0.0, 1.0, // 平移
        ];
        let pose = EndEffectorPose::from_transform(&t);
        let half = std::f64::consts::FRAC_1_SQRT_2;
        // 四元数与其相反数表示同一旋转
        let sign = pose.orientation[3].signum();
        assert_relative_eq!(pose.orientation[2] * sign, half, epsilon = 1e-9);
        assert_relative_eq!(pose.orientation[3] * sign, half, epsilon = 1e-9);
    }

    #[test]
    fn test_transform_preserves_rotation() {
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let pose = EndEffectorPose::new([0.3, 0.0, 0.5], [0.0, 0.0, half, half]);
        let t = pose.to_transform();
        // 绕 z 轴 90°：x 轴映射到 y 轴
        assert_relative_eq!(t[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(t[1], 1.0, epsilon = 1e-12);
        assert_eq!(&t[12..16], &[0.3, 0.0, 0.5, 1.0]);

        let back = EndEffectorPose::from_transform(&t);
        let sign = back.orientation[3].signum();
        assert_relative_eq!(back.orientation[2] * sign, half, epsilon = 1e-9);
        assert_eq!(back.position, pose.position);
    }

    #[test]
    fn test_displacement_from() {
        let a = EndEffectorPose::new([0.1, 0.2, 0.3], [0.0, 0.0, 0.0, 1.0]);
        let b = EndEffectorPose::new([0.4, 0.2, 0.1], [0.0, 0.0, 0.0, 1.0]);
        let d = b.displacement_from(&a);
        assert_relative_eq!(d[0], 0.3, epsilon = 1e-12);
        assert_relative_eq!(d[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(d[2], -0.2, epsilon = 1e-12);
    }
}
