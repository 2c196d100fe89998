//! 按销售订单分组
//!
//! 保持订单的首次出现顺序，以及订单内行项目的输入顺序。

use indexmap::IndexMap;

use crate::models::CreditBlockRecord;

/// 订单号 -> 行项目列表
pub type OrderGroups = IndexMap<String, Vec<CreditBlockRecord>>;

/// 将行项目按所属销售订单分组
///
/// `None` 与空输入均返回空映射。
pub fn group_by_order<I>(records: Option<I>) -> OrderGroups
where
    I: IntoIterator<Item = CreditBlockRecord>,
{
    let mut groups = OrderGroups::new();
    for record in records.into_iter().flatten() {
        groups
            .entry(record.sales_document.clone())
            .or_default()
            .push(record);
    }
    groups
}
