// ==========================================
// 农场区块生命周期 - 领域类型定义
// ==========================================
// 红线: 区块状态是封闭枚举,不允许自由字符串
// 序列化格式: lowercase (与数据库/前端一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 区块状态 (Block State)
// ==========================================
// 周期: empty → planned → planted → growing → (fruiting →) harvesting → cleaning → empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    Empty,      // 空闲
    Planned,    // 已计划
    Planted,    // 已种植
    Growing,    // 生长中
    Fruiting,   // 结果期 (可选阶段,由作物数据决定)
    Harvesting, // 采收中
    Cleaning,   // 清园
}

impl BlockState {
    /// 全部状态（按周期顺序）
    pub const ALL: [BlockState; 7] = [
        BlockState::Empty,
        BlockState::Planned,
        BlockState::Planted,
        BlockState::Growing,
        BlockState::Fruiting,
        BlockState::Harvesting,
        BlockState::Cleaning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockState::Empty => "empty",
            BlockState::Planned => "planned",
            BlockState::Planted => "planted",
            BlockState::Growing => "growing",
            BlockState::Fruiting => "fruiting",
            BlockState::Harvesting => "harvesting",
            BlockState::Cleaning => "cleaning",
        }
    }

    /// 是否属于"在种"状态（驾驶舱 totalActivePlantings 口径）
    pub fn is_active_planting(&self) -> bool {
        !matches!(self, BlockState::Empty | BlockState::Cleaning)
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "empty" => Ok(BlockState::Empty),
            "planned" => Ok(BlockState::Planned),
            "planted" => Ok(BlockState::Planted),
            "growing" => Ok(BlockState::Growing),
            "fruiting" => Ok(BlockState::Fruiting),
            "harvesting" => Ok(BlockState::Harvesting),
            "cleaning" => Ok(BlockState::Cleaning),
            other => Err(format!("未知区块状态: {}", other)),
        }
    }
}

// ==========================================
// 告警等级 (Alert Severity)
// ==========================================
// 顺序: Low < Medium < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(format!("未知告警等级: {}", other)),
        }
    }
}

// ==========================================
// 质量等级 (Quality Grade)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityGrade::A => write!(f, "A"),
            QualityGrade::B => write!(f, "B"),
            QualityGrade::C => write!(f, "C"),
        }
    }
}

impl FromStr for QualityGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(QualityGrade::A),
            "B" => Ok(QualityGrade::B),
            "C" => Ok(QualityGrade::C),
            other => Err(format!("未知质量等级: {}", other)),
        }
    }
}

// ==========================================
// 产量表现分类 (Performance Category)
// ==========================================
// 阈值基于未封顶的产量效率百分比
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceCategory {
    Poor,        // < 50
    Acceptable,  // ≥ 50
    Good,        // ≥ 70
    Excellent,   // ≥ 90
    Exceeding,   // ≥ 100
    Exceptional, // ≥ 200
}

impl fmt::Display for PerformanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PerformanceCategory::Poor => "poor",
            PerformanceCategory::Acceptable => "acceptable",
            PerformanceCategory::Good => "good",
            PerformanceCategory::Excellent => "excellent",
            PerformanceCategory::Exceeding => "exceeding",
            PerformanceCategory::Exceptional => "exceptional",
        };
        f.write_str(s)
    }
}

// ==========================================
// 用户角色 (User Role)
// ==========================================
// 只在边界做角色检查,认证机制不在本库范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Manager,
    Operator,
    Viewer,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Operator => "operator",
            UserRole::Viewer => "viewer",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_state_round_trip_strings() {
        for state in BlockState::ALL {
            let parsed: BlockState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
        assert!("withered".parse::<BlockState>().is_err());
    }

    #[test]
    fn test_block_state_serde_lowercase() {
        let json = serde_json::to_string(&BlockState::Harvesting).unwrap();
        assert_eq!(json, "\"harvesting\"");
    }

    #[test]
    fn test_active_planting() {
        assert!(!BlockState::Empty.is_active_planting());
        assert!(!BlockState::Cleaning.is_active_planting());
        assert!(BlockState::Planned.is_active_planting());
        assert!(BlockState::Harvesting.is_active_planting());
    }

    #[test]
    fn test_severity_order() {
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert!(AlertSeverity::Medium > AlertSeverity::Low);
    }
}
