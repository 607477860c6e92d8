//! 标记规范化服务 - 业务能力层
//!
//! 只负责两件事：
//! - `normalize`：纯文本清洗（去掉编辑器的分组包装、合并空白、给乘号加空格）
//! - `classify`：推断一行内容的意图（函数定义 / 赋值 / 命令 / 普通表达式）
//!
//! 两者都是纯函数，没有任何副作用，也从不报错。

use regex::Regex;
use serde::Serialize;
use std::fmt::Display;
use std::sync::LazyLock;

/// 被保留的常量名（自然常数、虚数单位、圆周率），不能被赋值
pub const RESERVED_NAMES: [&str; 5] = ["e", "i", "pi", "E", "I"];

static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z_]\w*)\s*\(([^)]*)\)\s*=\s*(.+)$").expect("static regex")
});

static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z_]\w*)\s*=\s*(.+)$").expect("static regex"));

static COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\\?([a-zA-Z]+)\s*\((.+)\)\s*$").expect("static regex")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_]\w*$").expect("static regex"));

static CONTROL_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([a-zA-Z]+)").expect("static regex"));

/// 已识别的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Solve,
    Factor,
    Expand,
    Simplify,
    Differentiate,
    Integrate,
    Limit,
    Series,
    Substitute,
    NumericalEvaluate,
    // 矩阵命令
    Determinant,
    Inverse,
    Trace,
    Transpose,
    Eigenvalues,
    Eigenvectors,
    Rank,
    Rref,
    CharacteristicPolynomial,
    Nullspace,
    Columnspace,
}

impl CommandKind {
    /// 从关键字解析命令
    ///
    /// 除了数值求值 `N` 必须大写以外，其它关键字都不区分大小写
    pub fn from_keyword(word: &str) -> Option<Self> {
        if word == "N" {
            return Some(CommandKind::NumericalEvaluate);
        }
        let kind = match word.to_ascii_lowercase().as_str() {
            "solve" => CommandKind::Solve,
            "factor" => CommandKind::Factor,
            "expand" => CommandKind::Expand,
            "simplify" => CommandKind::Simplify,
            "diff" => CommandKind::Differentiate,
            "integrate" => CommandKind::Integrate,
            "limit" => CommandKind::Limit,
            "series" => CommandKind::Series,
            "subs" => CommandKind::Substitute,
            "det" => CommandKind::Determinant,
            "inv" => CommandKind::Inverse,
            "trace" | "tr" => CommandKind::Trace,
            "transpose" | "trans" => CommandKind::Transpose,
            "eigenvals" | "eigenval" => CommandKind::Eigenvalues,
            "eigenvects" | "eigenvect" | "eigenvectors" | "eigenvector" => {
                CommandKind::Eigenvectors
            }
            "rank" => CommandKind::Rank,
            "rref" => CommandKind::Rref,
            "charpoly" => CommandKind::CharacteristicPolynomial,
            "nullspace" => CommandKind::Nullspace,
            "colspace" => CommandKind::Columnspace,
            _ => return None,
        };
        Some(kind)
    }

    /// 规范关键字
    pub fn keyword(self) -> &'static str {
        match self {
            CommandKind::Solve => "solve",
            CommandKind::Factor => "factor",
            CommandKind::Expand => "expand",
            CommandKind::Simplify => "simplify",
            CommandKind::Differentiate => "diff",
            CommandKind::Integrate => "integrate",
            CommandKind::Limit => "limit",
            CommandKind::Series => "series",
            CommandKind::Substitute => "subs",
            CommandKind::NumericalEvaluate => "N",
            CommandKind::Determinant => "det",
            CommandKind::Inverse => "inv",
            CommandKind::Trace => "trace",
            CommandKind::Transpose => "transpose",
            CommandKind::Eigenvalues => "eigenvals",
            CommandKind::Eigenvectors => "eigenvects",
            CommandKind::Rank => "rank",
            CommandKind::Rref => "rref",
            CommandKind::CharacteristicPolynomial => "charpoly",
            CommandKind::Nullspace => "nullspace",
            CommandKind::Columnspace => "colspace",
        }
    }
}

/// 一行内容的意图
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Classification {
    Plain {
        expression: String,
    },
    Assignment {
        name: String,
        expression: String,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: String,
    },
    Command {
        kind: CommandKind,
        raw_expression: String,
    },
}

impl Classification {
    /// 绑定的名字（赋值 / 函数定义）
    pub fn bound_name(&self) -> Option<&str> {
        match self {
            Classification::Assignment { name, .. } | Classification::FunctionDef { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }
}

impl Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Plain { .. } => write!(f, "表达式"),
            Classification::Assignment { name, .. } => write!(f, "赋值 {}", name),
            Classification::FunctionDef { name, params, .. } => {
                write!(f, "函数定义 {}({})", name, params.join(", "))
            }
            Classification::Command { kind, .. } => write!(f, "命令 {}", kind.keyword()),
        }
    }
}

// ========== normalize ==========

/// 规范化原始标记串
///
/// - 去掉 `\left` / `\right` 分组标记（保留其后的定界符）
/// - 把 `\operatorname{name}` 展开成 `name`
/// - 连续空白合并为一个空格，首尾空白去掉
/// - 乘号（`*`、`\cdot`、`\times`）两侧各留一个空格
///
/// 满足幂等：`normalize(normalize(s)) == normalize(s)`
pub fn normalize(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    rewrite(&chars, &mut out);
    out.trim().to_string()
}

fn rewrite(chars: &[char], out: &mut String) {
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if c == '\\' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end].is_ascii_alphabetic() {
                end += 1;
            }

            // 控制符号：反斜杠后跟一个非字母字符，原样保留
            if end == start {
                out.push('\\');
                if let Some(&next) = chars.get(start) {
                    out.push(next);
                    i = start + 1;
                } else {
                    i = start;
                }
                continue;
            }

            let word: String = chars[start..end].iter().collect();
            match word.as_str() {
                "left" | "right" => {
                    i = end;
                    continue;
                }
                "cdot" | "times" => {
                    push_operator(out, &format!("\\{}", word));
                    i = skip_whitespace(chars, end);
                    continue;
                }
                "operatorname" => {
                    if let Some(close) = matching_brace(chars, end) {
                        let inner = &chars[end + 1..close];
                        // `\alpha\operatorname{b}` 不能拼成 `\alphab`
                        if ends_with_control_word(out)
                            && inner.first().is_some_and(|c| c.is_ascii_alphabetic())
                        {
                            out.push(' ');
                        }
                        rewrite(inner, out);
                        i = close + 1;
                        continue;
                    }
                }
                _ => {}
            }

            out.push('\\');
            out.push_str(&word);
            i = end;
            continue;
        }

        if c == '*' {
            // `**` 是幂运算，不是乘号
            if chars.get(i + 1) == Some(&'*') {
                out.push_str("**");
                i += 2;
                continue;
            }
            push_operator(out, "*");
            i = skip_whitespace(chars, i + 1);
            continue;
        }

        if c.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            i += 1;
            continue;
        }

        out.push(c);
        i += 1;
    }
}

fn push_operator(out: &mut String, op: &str) {
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(op);
    out.push(' ');
}

fn ends_with_control_word(out: &str) -> bool {
    let letters = out
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    letters > 0 && out[..out.len() - letters].ends_with('\\')
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// `open` 处必须是 `{`，返回与之配对的 `}` 的位置
fn matching_brace(chars: &[char], open: usize) -> Option<usize> {
    if chars.get(open) != Some(&'{') {
        return None;
    }
    let mut depth = 0usize;
    for (offset, &c) in chars[open..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

// ========== classify ==========

type Matcher = fn(&str, &str) -> Option<Classification>;

/// 按优先级排列的匹配器
///
/// 顺序即决胜规则：函数定义 > 赋值 > 命令，都不匹配时为普通表达式。
/// `name(params) = body` 永远是函数定义，哪怕赋值模式也能宽松地匹配上。
const MATCHERS: [Matcher; 3] = [match_function_def, match_assignment, match_command];

/// 推断规范化后的标记串的意图
pub fn classify(cleaned: &str) -> Classification {
    let cleaned = cleaned.trim();
    // 匹配用的版本去掉了控制词的反斜杠：`\pi` → `pi`
    let plain = CONTROL_WORD.replace_all(cleaned, "$1");

    for matcher in MATCHERS {
        if let Some(classification) = matcher(cleaned, &plain) {
            return classification;
        }
    }

    Classification::Plain {
        expression: cleaned.to_string(),
    }
}

fn match_function_def(cleaned: &str, plain: &str) -> Option<Classification> {
    let caps = FUNCTION_DEF.captures(plain)?;
    let params: Vec<String> = caps[2].split(',').map(|p| p.trim().to_string()).collect();
    if params.iter().any(|p| !IDENTIFIER.is_match(p)) {
        return None;
    }
    let body = body_after_equals(cleaned)?;

    Some(Classification::FunctionDef {
        name: caps[1].to_string(),
        params,
        body,
    })
}

fn match_assignment(cleaned: &str, plain: &str) -> Option<Classification> {
    let caps = ASSIGNMENT.captures(plain)?;
    let name = &caps[1];
    if RESERVED_NAMES.contains(&name) {
        return None;
    }
    let expression = body_after_equals(cleaned)?;

    Some(Classification::Assignment {
        name: name.to_string(),
        expression,
    })
}

fn match_command(cleaned: &str, plain: &str) -> Option<Classification> {
    let caps = COMMAND.captures(plain)?;
    let kind = CommandKind::from_keyword(&caps[1])?;
    // 参数优先从保留了控制词的原串里取
    let raw_expression = COMMAND
        .captures(cleaned)
        .map(|orig| orig[2].trim().to_string())
        .unwrap_or_else(|| caps[2].trim().to_string());

    Some(Classification::Command {
        kind,
        raw_expression,
    })
}

/// 取第一个 `=` 之后的内容；`==` 这种比较不算定义
fn body_after_equals(cleaned: &str) -> Option<String> {
    let (_, body) = cleaned.split_once('=')?;
    let body = body.trim();
    if body.is_empty() || body.starts_with('=') {
        return None;
    }
    Some(body.to_string())
}
