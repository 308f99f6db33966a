//! 归属一致性推断
//! 检查所有拉取到的规则的分类/区段元数据：
//! - 全部一致 → 该值即规则集的归属
//! - 出现分歧 → 返回 `Placement::Conflicting` 哨兵，迫使下游替换整个规则集，
//!   而不是悄悄选择其中一个值

use crate::core::Placement;

/// 推断归属共识
///
/// # 参数
/// - `placements`: 每条远端规则的归属（`None` 表示元数据缺失）
///
/// # 返回值
/// - `None`: 没有任何规则，或所有规则都缺失元数据
/// - `Some(Placement::Conflicting)`: 规则之间互相矛盾
/// - `Some(p)`: 所有规则一致归属于 `p`
pub fn infer_consensus<I>(placements: I) -> Option<Placement>
where
    I: IntoIterator<Item = Option<Placement>>,
{
    let mut iter = placements.into_iter();
    let first = iter.next()?;
    let mut total = 1usize;

    for placement in iter {
        total += 1;
        if placement != first {
            log::warn!(
                "fetched rules disagree on placement ({:?} vs {:?}); marking rule set for replacement",
                first,
                placement
            );
            return Some(Placement::Conflicting);
        }
    }

    log::debug!("{} fetched rule(s) agree on placement {:?}", total, first);
    first
}
