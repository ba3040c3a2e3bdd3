use prettytable::{format, row, Cell, Row, Table};

use crate::models::result::RunResult;

pub fn show_result_with_table(result: &RunResult) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);

    table.add_row(row!["指标", "值"]);
    table.add_row(row!["耗时", format!("{:.2}s", result.total_duration)]);
    table.add_row(row!["RPS", format!("{:.3}", result.rps)]);
    table.add_row(row!["发出请求数", format!("{}", result.dispatched)]);
    table.add_row(row!["完成请求数", format!("{}", result.completed)]);
    table.add_row(row!["错误数量", format!("{}", result.err_count)]);
    table.add_row(row!["无效行", format!("{}", result.parse_failures)]);
    table.add_row(row!["放弃的请求", format!("{}", result.abandoned)]);
    table.add_row(row!["成功率", format!("{:.2}%", result.success_rate)]);
    table.add_row(row!["最大响应时间", format!("{} ms", result.max_response_time)]);
    table.add_row(row!["最小响应时间", format!("{} ms", result.min_response_time)]);
    table.add_row(row!["中位响应时间", format!("{} ms", result.median_response_time)]);
    table.add_row(row!["95%响应时间", format!("{} ms", result.response_time_95)]);
    table.add_row(row!["99%响应时间", format!("{} ms", result.response_time_99)]);
    println!("回放结果:");
    table.printstd();

    if !result.status_counts.is_empty() {
        let mut status_table = Table::new();
        status_table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        status_table.add_row(row!["状态码", "次数"]);
        for (code, count) in &result.status_counts {
            status_table.add_row(row![format!("{:03}", code), count]);
        }
        println!("状态码分布:");
        status_table.printstd();
    }

    if !result.http_errors.is_empty() {
        let mut errors_table = Table::new();
        errors_table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);

        errors_table.add_row(row!["错误代码", "错误信息", "次数"]);
        let mut errors: Vec<_> = result.http_errors.iter().collect();
        errors.sort_by(|a, b| b.1.cmp(a.1));
        for ((code, message), count) in errors {
            errors_table.add_row(Row::new(vec![
                Cell::new(format!("{:03}", code).as_str()),
                Cell::new(&format!("{:?}", message)).style_spec("R"),
                Cell::new(format!("{}", count).as_str()),
            ]));
        }
        println!("错误:");
        errors_table.printstd();
    }
}
