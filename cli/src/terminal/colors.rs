use colored::Color;

pub const PRIMARY: Color = Color::TrueColor { r: 94, g: 196, b: 255 };
pub const ACCENT: Color = Color::TrueColor { r: 255, g: 200, b: 87 };
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;

// Latency grades
pub const GRADE_LOW: Color = Color::TrueColor { r: 80, g: 220, b: 100 };
pub const GRADE_MEDIUM: Color = Color::TrueColor { r: 255, g: 165, b: 0 };
pub const GRADE_HIGH: Color = Color::TrueColor { r: 235, g: 64, b: 52 };
pub const UNREACHABLE: Color = Color::BrightBlack;
