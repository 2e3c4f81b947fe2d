use crate::domain::Chunk;

/// Sentence the model must answer with when the documents do not contain the answer.
pub const REFUSAL_SENTENCE: &str =
    "Tôi không thể tìm thấy thông tin liên quan trong các tài liệu được cung cấp.";

/// Answer returned when a question arrives before any document was processed.
pub const NO_INDEX_GUIDANCE: &str = "Vui lòng tạo văn bản bằng việc tải File PDF.";

pub fn system_instruction() -> String {
    format!(
        "Bạn là một trợ lý về quy trình, hãy đưa ra thông tin chính xác nhất cho người hỏi. Thực hiện theo các nguyên tắc sau:
1. Trả lời câu hỏi chỉ bằng thông tin từ các tệp PDF đã tải lên.
2. Sử dụng ngôn ngữ tiếng việt, đơn giản, rõ ràng.
3. Nếu câu trả lời không có trong tài liệu, hãy nói: '{REFUSAL_SENTENCE}'
4. Không suy đoán, giả định hoặc bịa đặt thông tin.
5. Duy trì giọng điệu chuyên nghiệp và sắp xếp câu trả lời rõ ràng (ví dụ: gạch đầu dòng, giải thích từng bước).
6. Khuyến khích các câu hỏi tiếp theo bằng cách hỏi xem có cần làm rõ thêm không.
7. Cung cấp các ví dụ để làm rõ các khái niệm khi hữu ích.
8. Giữ câu trả lời ngắn gọn, tập trung và thân thiện với bài kiểm tra.
9. Đưa ra câu trả lời bằng tiếng việt, không được dùng ngôn ngữ khác."
    )
}

pub fn user_turn(context: &str, question: &str) -> String {
    format!(
        "Context:
{context}

Question: {question}

Cung cấp một câu trả lời chính xác và có cấu trúc tốt dựa trên ngữ cảnh trên. Đảm bảo câu trả lời của bạn dễ hiểu, bao gồm các ví dụ khi cần thiết và được định dạng theo cách mà người hỏi có thể sử dụng câu trả lời đó. Nếu có, hãy hỏi xem người hỏi có cần làm rõ thêm không."
    )
}

/// Chunk texts in retrieval order, separated by a blank line. No truncation.
pub fn join_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render the full prompt: system instruction, then the user turn with context and question.
pub fn build_prompt(context_chunks: &[Chunk], question: &str) -> String {
    format!(
        "System: {}\nHuman: {}",
        system_instruction(),
        user_turn(&join_context(context_chunks), question)
    )
}
