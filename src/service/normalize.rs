/// 比对用的描述归一化: 去首尾空白 + 小写
pub fn normalize_description(text: &str) -> String {
    text.trim().to_lowercase()
}

/// 整理识别结果中的描述文本
///
/// 去掉连字符两侧的空白 ("A - B" -> "A-B"), 并把连续空格合并为一个。
pub fn normalize_hyphens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.trim().chars() {
        if ch == '-' {
            pending_space = false;
            while out.ends_with(char::is_whitespace) {
                out.pop();
            }
            out.push('-');
        } else if ch.is_whitespace() {
            if !out.ends_with('-') {
                pending_space = true;
            }
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        }
    }

    out
}
