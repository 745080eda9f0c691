//! Traditional-to-simplified character conversion.
//!
//! Comment text only needs character-level mapping of the high-frequency
//! traditional forms; full OpenCC-style phrase conversion is out of scope
//! for overlay comments.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

/// High-frequency traditional → simplified pairs.
static PAIRS: &[(char, char)] = &[
    ('萬', '万'), ('與', '与'), ('醜', '丑'), ('專', '专'), ('業', '业'),
    ('叢', '丛'), ('東', '东'), ('絲', '丝'), ('丟', '丢'), ('兩', '两'),
    ('嚴', '严'), ('喪', '丧'), ('個', '个'), ('豐', '丰'), ('臨', '临'),
    ('為', '为'), ('麗', '丽'), ('舉', '举'), ('義', '义'), ('烏', '乌'),
    ('樂', '乐'), ('喬', '乔'), ('習', '习'), ('鄉', '乡'), ('書', '书'),
    ('買', '买'), ('亂', '乱'), ('爭', '争'), ('於', '于'), ('虧', '亏'),
    ('雲', '云'), ('亞', '亚'), ('產', '产'), ('親', '亲'), ('億', '亿'),
    ('僅', '仅'), ('從', '从'), ('倫', '伦'), ('倉', '仓'), ('儀', '仪'),
    ('們', '们'), ('價', '价'), ('眾', '众'), ('優', '优'), ('會', '会'),
    ('傷', '伤'), ('倆', '俩'), ('傳', '传'), ('傷', '伤'), ('體', '体'),
    ('餘', '余'), ('傭', '佣'), ('僕', '仆'), ('備', '备'), ('側', '侧'),
    ('偵', '侦'), ('傑', '杰'), ('儲', '储'), ('內', '内'), ('岡', '冈'),
    ('冊', '册'), ('寫', '写'), ('軍', '军'), ('農', '农'), ('馮', '冯'),
    ('衝', '冲'), ('決', '决'), ('況', '况'), ('凍', '冻'), ('淨', '净'),
    ('涼', '凉'), ('減', '减'), ('湊', '凑'), ('幾', '几'), ('鳳', '凤'),
    ('憑', '凭'), ('凱', '凯'), ('擊', '击'), ('擬', '拟'), ('辦', '办'),
    ('務', '务'), ('動', '动'), ('勵', '励'), ('勁', '劲'), ('勞', '劳'),
    ('勢', '势'), ('勝', '胜'), ('勸', '劝'), ('區', '区'), ('醫', '医'),
    ('華', '华'), ('協', '协'), ('單', '单'), ('賣', '卖'), ('盧', '卢'),
    ('衛', '卫'), ('廠', '厂'), ('歷', '历'), ('厲', '厉'), ('壓', '压'),
    ('廳', '厅'), ('縣', '县'), ('參', '参'), ('雙', '双'), ('發', '发'),
    ('變', '变'), ('敘', '叙'), ('臺', '台'), ('號', '号'), ('嘆', '叹'),
    ('嚇', '吓'), ('聽', '听'), ('啟', '启'), ('吳', '吴'), ('嗚', '呜'),
    ('員', '员'), ('問', '问'), ('響', '响'), ('啞', '哑'), ('喚', '唤'),
    ('唸', '念'), ('噴', '喷'), ('嘗', '尝'), ('器', '器'), ('國', '国'),
    ('圖', '图'), ('圓', '圆'), ('園', '园'), ('團', '团'), ('圍', '围'),
    ('壞', '坏'), ('塊', '块'), ('堅', '坚'), ('壇', '坛'), ('場', '场'),
    ('塗', '涂'), ('墳', '坟'), ('壩', '坝'), ('報', '报'), ('聲', '声'),
    ('處', '处'), ('備', '备'), ('復', '复'), ('夠', '够'), ('頭', '头'),
    ('誇', '夸'), ('夾', '夹'), ('奪', '夺'), ('奮', '奋'), ('獎', '奖'),
    ('婦', '妇'), ('媽', '妈'), ('嫵', '妩'), ('嬌', '娇'), ('嬸', '婶'),
    ('嬰', '婴'), ('孫', '孙'), ('學', '学'), ('孿', '孪'), ('寧', '宁'),
    ('寶', '宝'), ('實', '实'), ('寵', '宠'), ('審', '审'), ('憲', '宪'),
    ('宮', '宫'), ('對', '对'), ('尋', '寻'), ('導', '导'), ('壽', '寿'),
    ('將', '将'), ('爾', '尔'), ('塵', '尘'), ('嘗', '尝'), ('層', '层'),
    ('屆', '届'), ('屬', '属'), ('歲', '岁'), ('豈', '岂'), ('嶼', '屿'),
    ('嵐', '岚'), ('島', '岛'), ('峽', '峡'), ('崗', '岗'), ('嶺', '岭'),
    ('師', '师'), ('幫', '帮'), ('帶', '带'), ('幀', '帧'), ('幹', '干'),
    ('廣', '广'), ('莊', '庄'), ('慶', '庆'), ('廬', '庐'), ('廢', '废'),
    ('開', '开'), ('異', '异'), ('棄', '弃'), ('張', '张'), ('彈', '弹'),
    ('強', '强'), ('歸', '归'), ('當', '当'), ('錄', '录'), ('彥', '彦'),
    ('徹', '彻'), ('徑', '径'), ('後', '后'), ('憶', '忆'), ('懷', '怀'),
    ('態', '态'), ('憤', '愤'), ('憐', '怜'), ('總', '总'), ('懇', '恳'),
    ('惡', '恶'), ('慟', '恸'), ('愛', '爱'), ('慣', '惯'), ('憊', '惫'),
    ('悶', '闷'), ('懲', '惩'), ('憶', '忆'), ('戀', '恋'), ('戰', '战'),
    ('戲', '戏'), ('戶', '户'), ('擴', '扩'), ('掃', '扫'), ('揚', '扬'),
    ('擾', '扰'), ('撫', '抚'), ('擇', '择'), ('掛', '挂'), ('擋', '挡'),
    ('擔', '担'), ('據', '据'), ('擠', '挤'), ('揮', '挥'), ('損', '损'),
    ('搖', '摇'), ('攤', '摊'), ('撐', '撑'), ('敵', '敌'), ('數', '数'),
    ('齊', '齐'), ('斷', '断'), ('無', '无'), ('舊', '旧'), ('時', '时'),
    ('曠', '旷'), ('晝', '昼'), ('顯', '显'), ('晉', '晋'), ('曬', '晒'),
    ('曉', '晓'), ('暈', '晕'), ('暢', '畅'), ('暫', '暂'), ('曆', '历'),
    ('術', '术'), ('樸', '朴'), ('機', '机'), ('殺', '杀'), ('雜', '杂'),
    ('權', '权'), ('條', '条'), ('來', '来'), ('楊', '杨'), ('標', '标'),
    ('棧', '栈'), ('欄', '栏'), ('樹', '树'), ('樣', '样'), ('橋', '桥'),
    ('檔', '档'), ('橫', '横'), ('檢', '检'), ('夢', '梦'), ('極', '极'),
    ('構', '构'), ('槍', '枪'), ('樓', '楼'), ('歡', '欢'), ('歐', '欧'),
    ('殘', '残'), ('殲', '歼'), ('毆', '殴'), ('氣', '气'), ('氫', '氢'),
    ('漢', '汉'), ('況', '况'), ('湯', '汤'), ('溝', '沟'), ('沒', '没'),
    ('澤', '泽'), ('潔', '洁'), ('灑', '洒'), ('濁', '浊'), ('測', '测'),
    ('濟', '济'), ('渾', '浑'), ('濃', '浓'), ('淺', '浅'), ('濤', '涛'),
    ('澇', '涝'), ('潤', '润'), ('漲', '涨'), ('漁', '渔'), ('滲', '渗'),
    ('溫', '温'), ('灣', '湾'), ('濕', '湿'), ('潰', '溃'), ('滅', '灭'),
    ('燈', '灯'), ('靈', '灵'), ('災', '灾'), ('煉', '炼'), ('煩', '烦'),
    ('燒', '烧'), ('燭', '烛'), ('煙', '烟'), ('熱', '热'), ('愛', '爱'),
    ('爺', '爷'), ('牆', '墙'), ('獨', '独'), ('狀', '状'), ('獲', '获'),
    ('猶', '犹'), ('獄', '狱'), ('獻', '献'), ('現', '现'), ('環', '环'),
    ('瑪', '玛'), ('瓊', '琼'), ('電', '电'), ('畫', '画'), ('當', '当'),
    ('療', '疗'), ('瘋', '疯'), ('癢', '痒'), ('發', '发'), ('皚', '皑'),
    ('蓋', '盖'), ('盤', '盘'), ('盡', '尽'), ('監', '监'), ('直', '直'),
    ('眞', '真'), ('矚', '瞩'), ('礦', '矿'), ('碼', '码'), ('磚', '砖'),
    ('礎', '础'), ('祕', '秘'), ('禍', '祸'), ('禮', '礼'), ('離', '离'),
    ('種', '种'), ('積', '积'), ('穩', '稳'), ('穫', '获'), ('窮', '穷'),
    ('竊', '窃'), ('競', '竞'), ('筆', '笔'), ('筍', '笋'), ('簡', '简'),
    ('簽', '签'), ('籌', '筹'), ('籃', '篮'), ('類', '类'), ('糧', '粮'),
    ('緊', '紧'), ('紅', '红'), ('純', '纯'), ('紙', '纸'), ('級', '级'),
    ('紛', '纷'), ('練', '练'), ('組', '组'), ('細', '细'), ('終', '终'),
    ('經', '经'), ('結', '结'), ('給', '给'), ('絕', '绝'), ('統', '统'),
    ('繼', '继'), ('續', '续'), ('維', '维'), ('綠', '绿'), ('網', '网'),
    ('罰', '罚'), ('羅', '罗'), ('義', '义'), ('聯', '联'), ('聰', '聪'),
    ('聖', '圣'), ('聞', '闻'), ('職', '职'), ('肅', '肃'), ('腦', '脑'),
    ('膚', '肤'), ('膠', '胶'), ('臉', '脸'), ('臟', '脏'), ('興', '兴'),
    ('艦', '舰'), ('艱', '艰'), ('蘭', '兰'), ('蘇', '苏'), ('藥', '药'),
    ('薦', '荐'), ('藍', '蓝'), ('藝', '艺'), ('蟲', '虫'), ('蝦', '虾'),
    ('螞', '蚂'), ('衆', '众'), ('補', '补'), ('裝', '装'), ('裏', '里'),
    ('見', '见'), ('規', '规'), ('視', '视'), ('覺', '觉'), ('觀', '观'),
    ('計', '计'), ('訂', '订'), ('認', '认'), ('討', '讨'), ('讓', '让'),
    ('訓', '训'), ('議', '议'), ('訊', '讯'), ('記', '记'), ('講', '讲'),
    ('許', '许'), ('論', '论'), ('設', '设'), ('訪', '访'), ('評', '评'),
    ('識', '识'), ('詐', '诈'), ('詞', '词'), ('譯', '译'), ('試', '试'),
    ('詩', '诗'), ('話', '话'), ('詳', '详'), ('誤', '误'), ('說', '说'),
    ('誰', '谁'), ('課', '课'), ('調', '调'), ('談', '谈'), ('請', '请'),
    ('諷', '讽'), ('謝', '谢'), ('謎', '谜'), ('謠', '谣'), ('證', '证'),
    ('譜', '谱'), ('警', '警'), ('贊', '赞'), ('貝', '贝'), ('負', '负'),
    ('財', '财'), ('貢', '贡'), ('貧', '贫'), ('購', '购'), ('貯', '贮'),
    ('貴', '贵'), ('費', '费'), ('賀', '贺'), ('資', '资'), ('賊', '贼'),
    ('賞', '赏'), ('賠', '赔'), ('賤', '贱'), ('賢', '贤'), ('賽', '赛'),
    ('贏', '赢'), ('趕', '赶'), ('趙', '赵'), ('跡', '迹'), ('踐', '践'),
    ('車', '车'), ('軌', '轨'), ('軟', '软'), ('較', '较'), ('輔', '辅'),
    ('輕', '轻'), ('輸', '输'), ('轉', '转'), ('輪', '轮'), ('輝', '辉'),
    ('轟', '轰'), ('辭', '辞'), ('農', '农'), ('邊', '边'), ('達', '达'),
    ('遷', '迁'), ('過', '过'), ('運', '运'), ('還', '还'), ('這', '这'),
    ('進', '进'), ('遠', '远'), ('違', '违'), ('連', '连'), ('遲', '迟'),
    ('選', '选'), ('遺', '遗'), ('郵', '邮'), ('鄰', '邻'), ('鄭', '郑'),
    ('釀', '酿'), ('釋', '释'), ('裡', '里'), ('金', '金'), ('針', '针'),
    ('釣', '钓'), ('鋼', '钢'), ('鈔', '钞'), ('鐘', '钟'), ('鋭', '锐'),
    ('錢', '钱'), ('鑽', '钻'), ('鐵', '铁'), ('鈴', '铃'), ('鉛', '铅'),
    ('銀', '银'), ('銅', '铜'), ('鎖', '锁'), ('鍋', '锅'), ('錯', '错'),
    ('鍵', '键'), ('鎮', '镇'), ('鏡', '镜'), ('長', '长'), ('門', '门'),
    ('閃', '闪'), ('閉', '闭'), ('開', '开'), ('間', '间'), ('閘', '闸'),
    ('闊', '阔'), ('隊', '队'), ('陽', '阳'), ('陰', '阴'), ('陣', '阵'),
    ('階', '阶'), ('際', '际'), ('陸', '陆'), ('隨', '随'), ('險', '险'),
    ('隱', '隐'), ('難', '难'), ('雞', '鸡'), ('雲', '云'), ('霧', '雾'),
    ('靂', '雳'), ('靜', '静'), ('麵', '面'), ('韓', '韩'), ('頁', '页'),
    ('頂', '顶'), ('項', '项'), ('順', '顺'), ('須', '须'), ('頑', '顽'),
    ('頓', '顿'), ('預', '预'), ('領', '领'), ('頻', '频'), ('題', '题'),
    ('額', '额'), ('顏', '颜'), ('願', '愿'), ('顧', '顾'), ('風', '风'),
    ('飄', '飘'), ('飛', '飞'), ('飯', '饭'), ('飲', '饮'), ('飽', '饱'),
    ('餓', '饿'), ('餐', '餐'), ('館', '馆'), ('飾', '饰'), ('馬', '马'),
    ('駐', '驻'), ('駕', '驾'), ('驗', '验'), ('驚', '惊'), ('騎', '骑'),
    ('騙', '骗'), ('貓', '猫'), ('體', '体'), ('魚', '鱼'),
    ('鮮', '鲜'), ('鳥', '鸟'), ('鳴', '鸣'), ('鴨', '鸭'), ('鵝', '鹅'),
    ('麥', '麦'), ('點', '点'), ('黨', '党'), ('鼓', '鼓'), ('齒', '齿'),
    ('龍', '龙'), ('龜', '龟'),
];

static TABLE: LazyLock<FxHashMap<char, char>> = LazyLock::new(|| {
    PAIRS.iter().filter(|(t, s)| t != s).copied().collect()
});

/// Convert traditional characters to simplified. Returns None when the text
/// contains nothing to convert, so callers can skip the allocation.
pub fn simplify(text: &str) -> Option<String> {
    if !text.chars().any(|c| TABLE.contains_key(&c)) {
        return None;
    }
    Some(
        text.chars()
            .map(|c| TABLE.get(&c).copied().unwrap_or(c))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_mixed_text() {
        assert_eq!(simplify("這個畫面太美").as_deref(), Some("这个画面太美"));
        assert_eq!(simplify("已经是简体"), None);
        assert_eq!(simplify("mixed 體text"), Some("mixed 体text".to_string()));
    }

    #[test]
    fn test_simplify_leaves_unknown_chars() {
        assert_eq!(simplify("龍貓123").as_deref(), Some("龙猫123"));
    }
}
