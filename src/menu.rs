//! Interactive prompts used when no `--action` flag is given.

use crate::pipeline::Action;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

const BANNER: &str = "
    ╔══════════════════════════════════════════╗
    ║        微博数据采集与分析系统            ║
    ╚══════════════════════════════════════════╝
";

const OPTIONS: &str = "
    1. 爬取微博数据
    2. 分析已有数据
    3. 完整流程(爬取+分析)
    4. 退出程序
";

pub struct Menu<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Menu<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn banner(&mut self) -> Result<()> {
        writeln!(self.output, "{}", BANNER).context("failed to write banner")
    }

    pub fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "\n{}", message).context("failed to write to terminal")
    }

    /// Ask until one of the four actions is picked. End of input means exit.
    pub fn choose_action(&mut self) -> Result<Action> {
        loop {
            write!(self.output, "{}", OPTIONS)?;
            let Some(answer) = self.prompt("    请选择操作 [1-4]: ")? else {
                return Ok(Action::Exit);
            };
            match answer.as_str() {
                "1" => return Ok(Action::Crawl),
                "2" => return Ok(Action::Analyze),
                "3" => return Ok(Action::CrawlThenAnalyze),
                "4" => return Ok(Action::Exit),
                _ => self.say("无效的选择，请重试")?,
            }
        }
    }

    /// Page count; blank input takes `default`.
    pub fn ask_pages(&mut self, default: u32) -> Result<u32> {
        loop {
            let question = format!("\n请输入要爬取的页数(建议{}页): ", default);
            let Some(answer) = self.prompt(&question)? else {
                return Ok(default);
            };
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse::<u32>() {
                Ok(pages) if pages > 0 => return Ok(pages),
                _ => self.say("页数必须是正整数")?,
            }
        }
    }

    /// Records file to analyze; blank input takes `default`.
    pub fn ask_records_path(&mut self, default: &Path) -> Result<PathBuf> {
        let question = format!(
            "\n请输入要分析的数据文件名(直接回车使用 {}): ",
            default.display()
        );
        match self.prompt(&question)? {
            Some(answer) if !answer.is_empty() => Ok(PathBuf::from(answer)),
            _ => Ok(default.to_path_buf()),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        self.prompt("\n按回车键继续...")?;
        Ok(())
    }

    /// Trimmed answer, or `None` at end of input.
    fn prompt(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{}", question)?;
        self.output.flush().context("failed to flush prompt")?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("failed to read answer")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn menu(input: &str) -> Menu<Cursor<Vec<u8>>, Vec<u8>> {
        Menu::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_choices_map_to_actions() {
        assert_eq!(menu("1\n").choose_action().unwrap(), Action::Crawl);
        assert_eq!(menu("2\n").choose_action().unwrap(), Action::Analyze);
        assert_eq!(menu(" 3 \n").choose_action().unwrap(), Action::CrawlThenAnalyze);
        assert_eq!(menu("4\n").choose_action().unwrap(), Action::Exit);
    }

    #[test]
    fn test_invalid_choice_asks_again() {
        let mut menu = menu("9\nabc\n2\n");
        assert_eq!(menu.choose_action().unwrap(), Action::Analyze);

        let shown = String::from_utf8(menu.output.clone()).unwrap();
        assert_eq!(shown.matches("无效的选择").count(), 2);
    }

    #[test]
    fn test_end_of_input_exits() {
        assert_eq!(menu("").choose_action().unwrap(), Action::Exit);
    }

    #[test]
    fn test_page_count_defaults_and_validation() {
        assert_eq!(menu("\n").ask_pages(50).unwrap(), 50);
        assert_eq!(menu("").ask_pages(50).unwrap(), 50);
        assert_eq!(menu("12\n").ask_pages(50).unwrap(), 12);
        assert_eq!(menu("0\n-3\n7\n").ask_pages(50).unwrap(), 7);
    }

    #[test]
    fn test_records_path_defaults() {
        let default = Path::new("weibo_data.csv");
        assert_eq!(menu("\n").ask_records_path(default).unwrap(), default);
        assert_eq!(
            menu("old_run.csv\n").ask_records_path(default).unwrap(),
            PathBuf::from("old_run.csv")
        );
    }
}
